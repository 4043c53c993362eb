use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::domain::identity::models::AuthResult;
use crate::domain::identity::models::Credentials;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Password;
use crate::domain::identity::models::PublicIdentity;
use crate::identity::errors::EmailError;
use crate::identity::errors::IdentityError;
use crate::identity::errors::PasswordPolicyError;

pub mod count_users;
pub mod delete_user;
pub mod get_profile;
pub mod get_user;
pub mod list_users;
pub mod login;
pub mod refresh;
pub mod register;
pub mod update_profile;
pub mod update_user;

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    InternalServerError(String),
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };

        (status, Json(ApiResponseBody::new_error(status, message))).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound(_) => ApiError::NotFound(err.to_string()),
            IdentityError::EmailAlreadyExists
            | IdentityError::InvalidEmail(_)
            | IdentityError::WeakPassword(_)
            | IdentityError::InvalidRole(_)
            | IdentityError::InvalidIdentityId(_) => ApiError::BadRequest(err.to_string()),
            IdentityError::InvalidCredentials
            | IdentityError::MissingToken
            | IdentityError::Unauthorized => ApiError::Unauthorized(err.to_string()),
            IdentityError::Hashing(_)
            | IdentityError::TokenGeneration(_)
            | IdentityError::DatabaseError(_) => {
                // Details stay in the logs, the caller gets a generic message
                tracing::error!("Internal error: {}", err);
                ApiError::InternalServerError("Internal server error".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

impl ApiResponseBody<ApiErrorData> {
    pub fn new_error(status_code: StatusCode, message: String) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data: ApiErrorData { message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorData {
    pub message: String,
}

/// Public identity projection as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityData {
    pub id: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<&PublicIdentity> for IdentityData {
    fn from(identity: &PublicIdentity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.as_str().to_string(),
            role: identity.role.as_str().to_string(),
            created_at: identity.created_at,
        }
    }
}

/// Response body shared by register, login, and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResponseData {
    pub user: IdentityData,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&AuthResult> for AuthResponseData {
    fn from(result: &AuthResult) -> Self {
        Self {
            user: (&result.identity).into(),
            access_token: result.access_token.clone(),
            refresh_token: result.refresh_token.clone(),
        }
    }
}

/// HTTP request body for register and login (raw JSON).
///
/// The same shape serves both endpoints; validation happens here, before
/// anything touches the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialsRequestBody {
    email: String,
    password: String,
}

#[derive(Debug, Clone, Error)]
pub enum ParseCredentialsError {
    #[error("{0}")]
    Email(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] PasswordPolicyError),
}

impl CredentialsRequestBody {
    pub fn try_into_credentials(self) -> Result<Credentials, ParseCredentialsError> {
        let email = EmailAddress::new(self.email)?;
        let password = Password::new(self.password)?;
        Ok(Credentials::new(email, password))
    }
}

impl From<ParseCredentialsError> for ApiError {
    fn from(err: ParseCredentialsError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
