use async_trait::async_trait;

use crate::domain::identity::models::AuthResult;
use crate::domain::identity::models::Credentials;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::PublicIdentity;
use crate::domain::identity::models::UpdateIdentityCommand;
use crate::identity::errors::IdentityError;

/// Port for the credential & session authority.
///
/// Every identity-shaped return value is the public projection; the full
/// record (with `password_hash`) stays behind this boundary.
#[async_trait]
pub trait IdentityServicePort: Send + Sync + 'static {
    /// Register a new identity and sign it in.
    ///
    /// # Arguments
    /// * `credentials` - Validated email and policy-checked password
    ///
    /// # Returns
    /// AuthResult with the new identity (role `standard`) and a fresh
    /// access+refresh token pair
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered (case-insensitive)
    /// * `Hashing` - Password hashing failed
    /// * `DatabaseError` - Store operation failed
    async fn register(&self, credentials: Credentials) -> Result<AuthResult, IdentityError>;

    /// Verify credentials and sign the identity in.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password, never
    ///   distinguished
    /// * `DatabaseError` - Store operation failed
    async fn login(&self, credentials: Credentials) -> Result<AuthResult, IdentityError>;

    /// Exchange a refresh token for a brand-new token pair.
    ///
    /// # Errors
    /// * `MissingToken` - Empty token string
    /// * `Unauthorized` - Invalid, expired, or wrong-purpose token, or the
    ///   subject no longer exists
    /// * `DatabaseError` - Store operation failed
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, IdentityError>;

    /// Retrieve an identity's public projection.
    ///
    /// # Errors
    /// * `NotFound` - Identity does not exist
    /// * `DatabaseError` - Store operation failed
    async fn get_identity(&self, id: &IdentityId) -> Result<PublicIdentity, IdentityError>;

    /// Update an identity with optional fields.
    ///
    /// A password change re-hashes through the password hasher; an email
    /// change is rejected when another identity already owns the address.
    ///
    /// # Errors
    /// * `NotFound` - Identity does not exist
    /// * `EmailAlreadyExists` - New email belongs to another identity
    /// * `Hashing` - Password hashing failed
    /// * `DatabaseError` - Store operation failed
    async fn update_identity(
        &self,
        id: &IdentityId,
        command: UpdateIdentityCommand,
    ) -> Result<PublicIdentity, IdentityError>;

    /// List identities, newest first, optionally filtered by an email
    /// substring.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn list_identities(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<PublicIdentity>, IdentityError>;

    /// Count all identities.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn count_identities(&self) -> Result<u64, IdentityError>;

    /// Delete an identity.
    ///
    /// # Errors
    /// * `NotFound` - Identity does not exist
    /// * `DatabaseError` - Store operation failed
    async fn delete_identity(&self, id: &IdentityId) -> Result<(), IdentityError>;
}

/// Persistence operations for the identity aggregate (the credential store).
///
/// Email uniqueness is enforced here, at the store level, not by service
/// locking; concurrent inserts of the same email must resolve to exactly one
/// success and `EmailAlreadyExists` for the rest.
#[async_trait]
pub trait IdentityRepository: Send + Sync + 'static {
    /// Persist a new identity.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Store operation failed
    async fn insert(&self, identity: Identity) -> Result<Identity, IdentityError>;

    /// Retrieve an identity by identifier.
    ///
    /// # Returns
    /// Optional identity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, IdentityError>;

    /// Retrieve an identity by email address (case-insensitive).
    ///
    /// # Returns
    /// Optional identity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError>;

    /// Retrieve identities, newest first, optionally filtered by an email
    /// substring.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn list(&self, search: Option<&str>) -> Result<Vec<Identity>, IdentityError>;

    /// Count stored identities.
    ///
    /// # Errors
    /// * `DatabaseError` - Store operation failed
    async fn count(&self) -> Result<u64, IdentityError>;

    /// Save an existing identity.
    ///
    /// # Errors
    /// * `NotFound` - Identity does not exist
    /// * `EmailAlreadyExists` - New email is already registered
    /// * `DatabaseError` - Store operation failed
    async fn update(&self, identity: Identity) -> Result<Identity, IdentityError>;

    /// Remove an identity.
    ///
    /// # Errors
    /// * `NotFound` - Identity does not exist
    /// * `DatabaseError` - Store operation failed
    async fn delete(&self, id: &IdentityId) -> Result<(), IdentityError>;
}
