use thiserror::Error;

/// Error for IdentityId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Incorrect email format: {0}")]
    InvalidFormat(String),
}

/// Error for password policy violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password is too short, password cannot be less than {min} chars")]
    TooShort { min: usize, actual: usize },
}

/// Error for Role parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("Unknown role: {0}")]
    Unknown(String),
}

/// Top-level error for all identity and auth operations.
///
/// Deliberately coarse where security requires it: an absent account and a
/// password mismatch are the same `InvalidCredentials`, and every refresh
/// failure is the same `Unauthorized`, so callers learn nothing about which
/// accounts exist. Messages never carry hashes, plaintext, or store internals.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    // Value object validation errors (converted via #[from])
    #[error("Invalid identity ID: {0}")]
    InvalidIdentityId(#[from] IdentityIdError),

    #[error("{0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0}")]
    WeakPassword(#[from] PasswordPolicyError),

    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),

    // Domain-level errors
    #[error("User with this email already exists")]
    EmailAlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please sign in")]
    MissingToken,

    #[error("Invalid token or expired")]
    Unauthorized,

    #[error("User not found: {0}")]
    NotFound(String),

    // Infrastructure errors
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
