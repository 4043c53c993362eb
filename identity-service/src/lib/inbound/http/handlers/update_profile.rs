use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::Password;
use crate::domain::identity::models::UpdateIdentityCommand;
use crate::identity::errors::EmailError;
use crate::identity::errors::PasswordPolicyError;
use crate::inbound::http::middleware::AuthenticatedIdentity;
use crate::inbound::http::router::AppState;

/// Update the caller's own profile. A password change re-hashes; a role
/// change is not possible here, only through the admin endpoint.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedIdentity>,
    Json(body): Json<UpdateProfileRequestBody>,
) -> Result<ApiSuccess<IdentityData>, ApiError> {
    state
        .identity_service
        .update_identity(&caller.identity.id, body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref identity| ApiSuccess::new(StatusCode::OK, identity.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateProfileRequestBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Error)]
enum ParseUpdateProfileError {
    #[error("{0}")]
    Email(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] PasswordPolicyError),
}

impl UpdateProfileRequestBody {
    fn try_into_command(self) -> Result<UpdateIdentityCommand, ParseUpdateProfileError> {
        let email = self.email.map(EmailAddress::new).transpose()?;
        let password = self.password.map(Password::new).transpose()?;

        Ok(UpdateIdentityCommand {
            email,
            password,
            role: None,
        })
    }
}

impl From<ParseUpdateProfileError> for ApiError {
    fn from(err: ParseUpdateProfileError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
