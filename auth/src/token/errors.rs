use thiserror::Error;

use super::claims::TokenPurpose;

/// Error type for token operations.
///
/// `Expired` and `Invalid` are distinct on purpose: an expired token is a
/// well-formed, correctly signed token past its validity window (callers may
/// silently attempt a refresh), while an invalid token is malformed or carries
/// a bad signature (callers should force re-authentication).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is invalid: {0}")]
    Invalid(String),

    #[error("Token is expired")]
    Expired,

    #[error("Token purpose mismatch: expected {expected} token, got {actual}")]
    WrongPurpose {
        expected: TokenPurpose,
        actual: TokenPurpose,
    },
}
