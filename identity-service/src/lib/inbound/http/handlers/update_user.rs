use std::str::FromStr;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::domain::identity::models::EmailAddress;
use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::Password;
use crate::domain::identity::models::Role;
use crate::domain::identity::models::UpdateIdentityCommand;
use crate::identity::errors::EmailError;
use crate::identity::errors::PasswordPolicyError;
use crate::identity::errors::RoleError;
use crate::inbound::http::router::AppState;

/// Admin update of any identity, including role changes.
pub async fn update_user(
    State(state): State<AppState>,
    Path(identity_id): Path<String>,
    Json(body): Json<UpdateUserRequestBody>,
) -> Result<ApiSuccess<IdentityData>, ApiError> {
    let identity_id =
        IdentityId::from_string(&identity_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .identity_service
        .update_identity(&identity_id, body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref identity| ApiSuccess::new(StatusCode::OK, identity.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateUserRequestBody {
    email: Option<String>,
    password: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Clone, Error)]
enum ParseUpdateUserError {
    #[error("{0}")]
    Email(#[from] EmailError),

    #[error("{0}")]
    Password(#[from] PasswordPolicyError),

    #[error("{0}")]
    Role(#[from] RoleError),
}

impl UpdateUserRequestBody {
    fn try_into_command(self) -> Result<UpdateIdentityCommand, ParseUpdateUserError> {
        let email = self.email.map(EmailAddress::new).transpose()?;
        let password = self.password.map(Password::new).transpose()?;
        let role = self.role.map(|r| Role::from_str(&r)).transpose()?;

        Ok(UpdateIdentityCommand {
            email,
            password,
            role,
        })
    }
}

impl From<ParseUpdateUserError> for ApiError {
    fn from(err: ParseUpdateUserError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
