//! Credential primitives library
//!
//! Provides the two cryptographic leaves of the authentication core:
//! - Password hashing and verification (Argon2id)
//! - Signed, time-bounded, purpose-tagged tokens (JWT)
//!
//! The library is deliberately free of I/O and async: services own the
//! orchestration (lookups, persistence, token pairing) and call into these
//! primitives. Both are constructed from injected configuration so tests can
//! supply fixed keys and cheap cost parameters.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).unwrap());
//! ```
//!
//! ## Tokens
//! ```
//! use auth::{TokenIssuer, TokenPurpose};
//!
//! let issuer = TokenIssuer::new(b"secret_key_at_least_32_bytes_long!");
//! let token = issuer.issue("user123", TokenPurpose::Access).unwrap();
//! let claims = issuer.verify(&token, TokenPurpose::Access).unwrap();
//! assert_eq!(claims.sub, "user123");
//! ```

pub mod password;
pub mod token;

// Re-export commonly used items
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use token::Claims;
pub use token::TokenError;
pub use token::TokenIssuer;
pub use token::TokenPurpose;
