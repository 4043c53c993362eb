use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use auth::TokenIssuer;
use auth::TokenPurpose;
use chrono::Duration;
use identity_service::domain::identity::models::Identity;
use identity_service::domain::identity::models::IdentityId;
use identity_service::domain::identity::models::Role;
use identity_service::domain::identity::service::IdentityService;
use identity_service::identity::errors::IdentityError;
use identity_service::identity::ports::IdentityRepository;
use identity_service::identity::ports::IdentityServicePort;
use identity_service::inbound::http::router::create_router;
use serde_json::json;
use uuid::Uuid;

pub const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

/// In-memory credential store standing in for Postgres.
///
/// Enforces the same contract the real store does: case-insensitive email
/// uniqueness on insert and update, `NotFound` on updates/deletes of absent
/// rows, newest-first listing.
pub struct InMemoryIdentityRepository {
    identities: Mutex<HashMap<Uuid, Identity>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self {
            identities: Mutex::new(HashMap::new()),
        }
    }

    /// Flip an identity's role directly in the store, bypassing the API.
    /// Test seeding only; the first admin has to come from somewhere.
    pub fn set_role(&self, email: &str, role: Role) {
        let mut identities = self.identities.lock().unwrap();
        for identity in identities.values_mut() {
            if identity.email.as_str().eq_ignore_ascii_case(email) {
                identity.role = role;
            }
        }
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn insert(&self, identity: Identity) -> Result<Identity, IdentityError> {
        let mut identities = self.identities.lock().unwrap();

        let duplicate = identities
            .values()
            .any(|existing| existing.email.as_str().eq_ignore_ascii_case(identity.email.as_str()));
        if duplicate {
            return Err(IdentityError::EmailAlreadyExists);
        }

        identities.insert(identity.id.0, identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, IdentityError> {
        let identities = self.identities.lock().unwrap();
        Ok(identities.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError> {
        let identities = self.identities.lock().unwrap();
        Ok(identities
            .values()
            .find(|identity| identity.email.as_str().eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Identity>, IdentityError> {
        let identities = self.identities.lock().unwrap();

        let mut matching: Vec<Identity> = identities
            .values()
            .filter(|identity| match search {
                Some(term) => identity
                    .email
                    .as_str()
                    .contains(&term.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching)
    }

    async fn count(&self) -> Result<u64, IdentityError> {
        let identities = self.identities.lock().unwrap();
        Ok(identities.len() as u64)
    }

    async fn update(&self, identity: Identity) -> Result<Identity, IdentityError> {
        let mut identities = self.identities.lock().unwrap();

        if !identities.contains_key(&identity.id.0) {
            return Err(IdentityError::NotFound(identity.id.to_string()));
        }

        let email_taken = identities.values().any(|existing| {
            existing.id != identity.id
                && existing.email.as_str().eq_ignore_ascii_case(identity.email.as_str())
        });
        if email_taken {
            return Err(IdentityError::EmailAlreadyExists);
        }

        identities.insert(identity.id.0, identity.clone());
        Ok(identity)
    }

    async fn delete(&self, id: &IdentityId) -> Result<(), IdentityError> {
        let mut identities = self.identities.lock().unwrap();

        identities
            .remove(&id.0)
            .map(|_| ())
            .ok_or(IdentityError::NotFound(id.to_string()))
    }
}

/// Test application that spawns a real server on a random port
pub struct TestApp {
    pub address: String,
    pub repository: Arc<InMemoryIdentityRepository>,
    pub api_client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let repository = Arc::new(InMemoryIdentityRepository::new());
        let token_issuer = Arc::new(TokenIssuer::new(TEST_SECRET));

        let identity_service: Arc<dyn IdentityServicePort> = Arc::new(IdentityService::new(
            Arc::clone(&repository),
            Arc::clone(&token_issuer),
        ));

        let router = create_router(identity_service, token_issuer);

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            repository,
            api_client: reqwest::Client::new(),
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make PATCH request with Bearer token
    pub fn patch_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .patch(format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    /// Helper to make DELETE request with Bearer token
    pub fn delete_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client
            .delete(format!("{}{}", self.address, path))
            .bearer_auth(token)
    }

    /// Register an account and return the parsed response body
    pub async fn register(&self, email: &str, password: &str) -> serde_json::Value {
        let response = self
            .post("/api/auth/register")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Failed to parse response")
    }

    /// Mint an access token that expired two minutes ago, signed with the
    /// server's key
    pub fn expired_access_token(&self, subject: &str) -> String {
        TokenIssuer::with_ttls(TEST_SECRET, Duration::seconds(-120), Duration::seconds(-120))
            .issue(subject, TokenPurpose::Access)
            .expect("Failed to issue token")
    }
}
