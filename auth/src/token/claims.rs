use std::fmt;

use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// What a token is good for.
///
/// Access tokens are short-lived proofs presented on every privileged
/// request; refresh tokens are long-lived and accepted only by the refresh
/// endpoint. The purpose is signed into the token so one can never be
/// replayed where the other is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Access,
    Refresh,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed token payload.
///
/// Every field is mandatory: a token without an expiry or a purpose does not
/// verify. The subject is the opaque identity id; no role or other mutable
/// state is embedded, callers resolve those against the store at use time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp), `iat` + purpose TTL
    pub exp: i64,

    /// What this token may be used for
    pub purpose: TokenPurpose,

    /// Unique token identifier; keeps two tokens minted within the same
    /// second from serializing identically
    pub jti: String,
}

impl Claims {
    /// Create claims for a subject, expiring `ttl` from now.
    pub fn new(subject: impl ToString, purpose: TokenPurpose, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            purpose,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Check whether the token is expired at the given timestamp.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}
