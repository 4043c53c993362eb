use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordHasher;
use auth::TokenIssuer;
use auth::TokenPurpose;
use chrono::Utc;

use crate::domain::identity::models::AuthResult;
use crate::domain::identity::models::Credentials;
use crate::domain::identity::models::Identity;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::Password;
use crate::domain::identity::models::PublicIdentity;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::UpdateIdentityCommand;
use crate::identity::errors::IdentityError;
use crate::identity::ports::IdentityRepository;
use crate::identity::ports::IdentityServicePort;

/// The credential & session authority.
///
/// Orchestrates the password hasher, the token issuer, and the credential
/// store. Stateless between requests; the store is the single source of
/// truth and enforces email uniqueness itself.
pub struct IdentityService<R>
where
    R: IdentityRepository,
{
    repository: Arc<R>,
    token_issuer: Arc<TokenIssuer>,
    password_hasher: PasswordHasher,
    unknown_email_hash: String,
}

impl<R> IdentityService<R>
where
    R: IdentityRepository,
{
    /// Create the service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - Credential store implementation
    /// * `token_issuer` - Token issuer holding the process-wide signing key
    pub fn new(repository: Arc<R>, token_issuer: Arc<TokenIssuer>) -> Self {
        let password_hasher = PasswordHasher::new();

        // Verified against when login hits an unknown email, so that path
        // costs one argon2 pass just like a password mismatch does
        let unknown_email_hash = password_hasher
            .hash("placeholder-credential")
            .unwrap_or_default();

        Self {
            repository,
            token_issuer,
            password_hasher,
            unknown_email_hash,
        }
    }

    /// Hash a password on the blocking pool.
    ///
    /// Argon2 blocks the calling thread for tens of milliseconds; dispatching
    /// it keeps one slow hash from stalling unrelated requests.
    async fn hash_password(&self, password: &Password) -> Result<String, IdentityError> {
        let hasher = self.password_hasher.clone();
        let plaintext = password.expose().to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))?
            .map_err(|e| IdentityError::Hashing(e.to_string()))
    }

    /// Verify a password against a stored hash on the blocking pool.
    async fn verify_password(
        &self,
        password: &Password,
        stored_hash: String,
    ) -> Result<bool, IdentityError> {
        let hasher = self.password_hasher.clone();
        let plaintext = password.expose().to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &stored_hash))
            .await
            .map_err(|e| IdentityError::Hashing(e.to_string()))?
            .map_err(|e| IdentityError::Hashing(e.to_string()))
    }

    /// Mint a fresh access+refresh pair and project the identity.
    fn issue_auth_result(&self, identity: &Identity) -> Result<AuthResult, IdentityError> {
        let subject = identity.id.to_string();

        let access_token = self
            .token_issuer
            .issue(&subject, TokenPurpose::Access)
            .map_err(|e| IdentityError::TokenGeneration(e.to_string()))?;
        let refresh_token = self
            .token_issuer
            .issue(&subject, TokenPurpose::Refresh)
            .map_err(|e| IdentityError::TokenGeneration(e.to_string()))?;

        Ok(AuthResult {
            identity: PublicIdentity::from(identity),
            access_token,
            refresh_token,
        })
    }
}

#[async_trait]
impl<R> IdentityServicePort for IdentityService<R>
where
    R: IdentityRepository,
{
    async fn register(&self, credentials: Credentials) -> Result<AuthResult, IdentityError> {
        if self
            .repository
            .find_by_email(credentials.email.as_str())
            .await?
            .is_some()
        {
            return Err(IdentityError::EmailAlreadyExists);
        }

        let password_hash = self.hash_password(&credentials.password).await?;

        let identity = Identity {
            id: IdentityId::new(),
            email: credentials.email,
            password_hash,
            role: Role::Standard,
            created_at: Utc::now(),
        };

        // The pre-check above races with concurrent registrations; the store's
        // uniqueness constraint is what actually decides, surfacing here as
        // EmailAlreadyExists
        let created = self.repository.insert(identity).await?;

        tracing::info!(identity_id = %created.id, "Identity registered");

        self.issue_auth_result(&created)
    }

    async fn login(&self, credentials: Credentials) -> Result<AuthResult, IdentityError> {
        let identity = match self
            .repository
            .find_by_email(credentials.email.as_str())
            .await?
        {
            Some(identity) => identity,
            None => {
                // Burn a verification against a fixed hash so an unknown
                // email takes as long as a wrong password
                let _ = self
                    .verify_password(&credentials.password, self.unknown_email_hash.clone())
                    .await;
                return Err(IdentityError::InvalidCredentials);
            }
        };

        let is_valid = self
            .verify_password(&credentials.password, identity.password_hash.clone())
            .await?;

        if !is_valid {
            tracing::debug!(identity_id = %identity.id, "Login rejected");
            return Err(IdentityError::InvalidCredentials);
        }

        self.issue_auth_result(&identity)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, IdentityError> {
        if refresh_token.is_empty() {
            return Err(IdentityError::MissingToken);
        }

        let claims = self
            .token_issuer
            .verify(refresh_token, TokenPurpose::Refresh)
            .map_err(|e| {
                tracing::debug!("Refresh token rejected: {}", e);
                IdentityError::Unauthorized
            })?;

        let identity_id =
            IdentityId::from_string(&claims.sub).map_err(|_| IdentityError::Unauthorized)?;

        // The account may have been deleted while the token was still live
        let identity = self
            .repository
            .find_by_id(&identity_id)
            .await?
            .ok_or(IdentityError::Unauthorized)?;

        // Rotation is stateless: the pair handed out here is brand new, but
        // the presented token stays valid until its own expiry
        self.issue_auth_result(&identity)
    }

    async fn get_identity(&self, id: &IdentityId) -> Result<PublicIdentity, IdentityError> {
        self.repository
            .find_by_id(id)
            .await?
            .map(|identity| PublicIdentity::from(&identity))
            .ok_or(IdentityError::NotFound(id.to_string()))
    }

    async fn update_identity(
        &self,
        id: &IdentityId,
        command: UpdateIdentityCommand,
    ) -> Result<PublicIdentity, IdentityError> {
        let mut identity = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(IdentityError::NotFound(id.to_string()))?;

        if let Some(new_email) = command.email {
            if let Some(existing) = self.repository.find_by_email(new_email.as_str()).await? {
                if existing.id != identity.id {
                    return Err(IdentityError::EmailAlreadyExists);
                }
            }
            identity.email = new_email;
        }

        if let Some(new_password) = command.password {
            identity.password_hash = self.hash_password(&new_password).await?;
        }

        if let Some(new_role) = command.role {
            identity.role = new_role;
        }

        let updated = self.repository.update(identity).await?;

        Ok(PublicIdentity::from(&updated))
    }

    async fn list_identities(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<PublicIdentity>, IdentityError> {
        let identities = self.repository.list(search).await?;

        Ok(identities.iter().map(PublicIdentity::from).collect())
    }

    async fn count_identities(&self) -> Result<u64, IdentityError> {
        self.repository.count().await
    }

    async fn delete_identity(&self, id: &IdentityId) -> Result<(), IdentityError> {
        self.repository.delete(id).await?;

        tracing::info!(identity_id = %id, "Identity deleted");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use auth::TokenPurpose;
    use mockall::mock;

    use super::*;
    use crate::domain::identity::models::EmailAddress;

    mock! {
        pub TestIdentityRepository {}

        #[async_trait]
        impl IdentityRepository for TestIdentityRepository {
            async fn insert(&self, identity: Identity) -> Result<Identity, IdentityError>;
            async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, IdentityError>;
            async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError>;
            #[mockall::concretize]
            async fn list(&self, search: Option<&str>) -> Result<Vec<Identity>, IdentityError>;
            async fn count(&self) -> Result<u64, IdentityError>;
            async fn update(&self, identity: Identity) -> Result<Identity, IdentityError>;
            async fn delete(&self, id: &IdentityId) -> Result<(), IdentityError>;
        }
    }

    const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    fn test_issuer() -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new(TEST_SECRET))
    }

    fn test_service(
        repository: MockTestIdentityRepository,
    ) -> IdentityService<MockTestIdentityRepository> {
        IdentityService::new(Arc::new(repository), test_issuer())
    }

    fn test_credentials(email: &str, password: &str) -> Credentials {
        Credentials::new(
            EmailAddress::new(email.to_string()).unwrap(),
            Password::new(password.to_string()).unwrap(),
        )
    }

    fn stored_identity(email: &str, password: &str) -> Identity {
        Identity {
            id: IdentityId::new(),
            email: EmailAddress::new(email.to_string()).unwrap(),
            password_hash: PasswordHasher::new().hash(password).unwrap(),
            role: Role::Standard,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_success() {
        let mut repository = MockTestIdentityRepository::new();

        repository
            .expect_find_by_email()
            .withf(|email| email == "alice@test.com")
            .times(1)
            .returning(|_| Ok(None));

        repository
            .expect_insert()
            .withf(|identity| {
                identity.email.as_str() == "alice@test.com"
                    && identity.role == Role::Standard
                    && identity.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|identity| Ok(identity));

        let service = test_service(repository);

        let result = service
            .register(test_credentials("alice@test.com", "secret1"))
            .await
            .expect("Registration failed");

        assert_eq!(result.identity.email.as_str(), "alice@test.com");
        assert_eq!(result.identity.role, Role::Standard);

        // Both tokens name the new identity and carry their own purpose
        let issuer = test_issuer();
        let access = issuer
            .verify(&result.access_token, TokenPurpose::Access)
            .unwrap();
        let refresh = issuer
            .verify(&result.refresh_token, TokenPurpose::Refresh)
            .unwrap();
        assert_eq!(access.sub, result.identity.id.to_string());
        assert_eq!(refresh.sub, result.identity.id.to_string());
        assert_ne!(result.access_token, result.refresh_token);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut repository = MockTestIdentityRepository::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(Some(stored_identity("alice@test.com", "secret1"))));

        repository.expect_insert().times(0);

        let service = test_service(repository);

        let result = service
            .register(test_credentials("alice@test.com", "secret2"))
            .await;

        assert!(matches!(result, Err(IdentityError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_register_duplicate_lost_race() {
        // Pre-check passes but the store's uniqueness constraint fires
        let mut repository = MockTestIdentityRepository::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        repository
            .expect_insert()
            .times(1)
            .returning(|_| Err(IdentityError::EmailAlreadyExists));

        let service = test_service(repository);

        let result = service
            .register(test_credentials("alice@test.com", "secret1"))
            .await;

        assert!(matches!(result, Err(IdentityError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_login_success() {
        let identity = stored_identity("alice@test.com", "secret1");
        let identity_id = identity.id;

        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_email()
            .withf(|email| email == "alice@test.com")
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));

        let service = test_service(repository);

        let result = service
            .login(test_credentials("alice@test.com", "secret1"))
            .await
            .expect("Login failed");

        assert_eq!(result.identity.id, identity_id);

        let access = test_issuer()
            .verify(&result.access_token, TokenPurpose::Access)
            .unwrap();
        assert_eq!(access.sub, identity_id.to_string());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let identity = stored_identity("alice@test.com", "secret1");

        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));

        let service = test_service(repository);

        let result = service
            .login(test_credentials("alice@test.com", "wrongpass"))
            .await;

        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email_is_indistinguishable() {
        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = test_service(repository);

        let result = service
            .login(test_credentials("nobody@test.com", "whatever"))
            .await;

        // Same error kind and message as a password mismatch
        let err = result.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let identity = stored_identity("alice@test.com", "secret1");
        let identity_id = identity.id;

        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_id()
            .withf(move |id| *id == identity_id)
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));

        let service = test_service(repository);

        let refresh_token = test_issuer()
            .issue(&identity_id.to_string(), TokenPurpose::Refresh)
            .unwrap();

        let result = service
            .refresh(&refresh_token)
            .await
            .expect("Refresh failed");

        assert_eq!(result.identity.id, identity_id);
        assert_ne!(result.refresh_token, refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let repository = MockTestIdentityRepository::new();
        let service = test_service(repository);

        let access_token = test_issuer()
            .issue(&IdentityId::new().to_string(), TokenPurpose::Access)
            .unwrap();

        let result = service.refresh(&access_token).await;
        assert!(matches!(result, Err(IdentityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage() {
        let repository = MockTestIdentityRepository::new();
        let service = test_service(repository);

        let result = service.refresh("not.a.token").await;
        assert!(matches!(result, Err(IdentityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_empty_token() {
        let repository = MockTestIdentityRepository::new();
        let service = test_service(repository);

        let result = service.refresh("").await;
        assert!(matches!(result, Err(IdentityError::MissingToken)));
    }

    #[tokio::test]
    async fn test_refresh_for_deleted_identity() {
        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = test_service(repository);

        let refresh_token = test_issuer()
            .issue(&IdentityId::new().to_string(), TokenPurpose::Refresh)
            .unwrap();

        let result = service.refresh(&refresh_token).await;
        assert!(matches!(result, Err(IdentityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_update_identity_rehashes_password() {
        let identity = stored_identity("alice@test.com", "secret1");
        let identity_id = identity.id;
        let old_hash = identity.password_hash.clone();

        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));

        let expected_old_hash = old_hash.clone();
        repository
            .expect_update()
            .withf(move |updated| {
                updated.password_hash.starts_with("$argon2")
                    && updated.password_hash != expected_old_hash
            })
            .times(1)
            .returning(|updated| Ok(updated));

        let service = test_service(repository);

        let command = UpdateIdentityCommand {
            email: None,
            password: Some(Password::new("new-secret".to_string()).unwrap()),
            role: None,
        };

        let result = service.update_identity(&identity_id, command).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_update_identity_email_conflict() {
        let identity = stored_identity("alice@test.com", "secret1");
        let identity_id = identity.id;
        let other = stored_identity("bob@test.com", "secret2");

        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));
        repository
            .expect_find_by_email()
            .withf(|email| email == "bob@test.com")
            .times(1)
            .returning(move |_| Ok(Some(other.clone())));
        repository.expect_update().times(0);

        let service = test_service(repository);

        let command = UpdateIdentityCommand {
            email: Some(EmailAddress::new("bob@test.com".to_string()).unwrap()),
            password: None,
            role: None,
        };

        let result = service.update_identity(&identity_id, command).await;
        assert!(matches!(result, Err(IdentityError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn test_update_identity_role_promotion() {
        let identity = stored_identity("alice@test.com", "secret1");
        let identity_id = identity.id;

        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(identity.clone())));
        repository
            .expect_update()
            .withf(|updated| updated.role == Role::Admin)
            .times(1)
            .returning(|updated| Ok(updated));

        let service = test_service(repository);

        let command = UpdateIdentityCommand {
            email: None,
            password: None,
            role: Some(Role::Admin),
        };

        let updated = service
            .update_identity(&identity_id, command)
            .await
            .expect("Update failed");
        assert_eq!(updated.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_get_identity_not_found() {
        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = test_service(repository);

        let result = service.get_identity(&IdentityId::new()).await;
        assert!(matches!(result, Err(IdentityError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_identity_not_found() {
        let mut repository = MockTestIdentityRepository::new();
        repository
            .expect_delete()
            .times(1)
            .returning(|id| Err(IdentityError::NotFound(id.to_string())));

        let service = test_service(repository);

        let result = service.delete_identity(&IdentityId::new()).await;
        assert!(matches!(result, Err(IdentityError::NotFound(_))));
    }
}
