use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::identity::models::IdentityId;
use crate::inbound::http::router::AppState;

pub async fn delete_user(
    State(state): State<AppState>,
    Path(identity_id): Path<String>,
) -> Result<ApiSuccess<()>, ApiError> {
    let identity_id =
        IdentityId::from_string(&identity_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .identity_service
        .delete_identity(&identity_id)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, ()))
}
