use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::identity::errors::EmailError;
use crate::identity::errors::IdentityIdError;
use crate::identity::errors::PasswordPolicyError;
use crate::identity::errors::RoleError;

/// Identity aggregate entity.
///
/// The durable record of a registered account. Owned by the credential store;
/// the service holds it only for the duration of a request. `password_hash`
/// is the only secret field and never crosses the domain boundary outward,
/// every result goes through [`PublicIdentity`] first.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: IdentityId,
    pub email: EmailAddress,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Identity unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    /// Generate a new random identity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identity ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, IdentityIdError> {
        Uuid::parse_str(s)
            .map(IdentityId)
            .map_err(|e| IdentityIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates format using an RFC 5322 compliant parser and lowercases on
/// construction, so equality and store uniqueness are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated, case-normalized email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email.to_lowercase()))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    /// Get email as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What an identity is allowed to do.
///
/// Registration always produces `Standard`; promotion to `Admin` happens only
/// through the admin update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standard,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Role::Standard),
            "admin" => Ok(Role::Admin),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plaintext password, request-scoped.
///
/// Exists only between request parsing and hashing, is never persisted, and
/// redacts itself from `Debug` output so it cannot reach logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 6;

    /// Create a policy-checked password.
    ///
    /// # Errors
    /// * `TooShort` - Password shorter than 6 characters
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        if password.len() < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: password.len(),
            });
        }
        Ok(Self(password))
    }

    /// Get the plaintext for hashing or verification.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Transient register/login input with domain types
#[derive(Debug)]
pub struct Credentials {
    pub email: EmailAddress,
    pub password: Password,
}

impl Credentials {
    pub fn new(email: EmailAddress, password: Password) -> Self {
        Self { email, password }
    }
}

/// Command to update an existing identity with optional validated fields.
///
/// Only provided fields are updated. `role` is populated exclusively by the
/// admin update path; a password change re-hashes through the hasher.
#[derive(Debug, Default)]
pub struct UpdateIdentityCommand {
    pub email: Option<EmailAddress>,
    pub password: Option<Password>,
    pub role: Option<Role>,
}

/// Public projection of an identity.
///
/// The only identity shape allowed to leave the domain layer; carries no
/// secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    pub id: IdentityId,
    pub email: EmailAddress,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for PublicIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            created_at: identity.created_at,
        }
    }
}

/// Result of a successful register, login, or refresh.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub identity: PublicIdentity,
    pub access_token: String,
    pub refresh_token: String,
}
