use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::ApiError;
use super::ApiSuccess;
use super::AuthResponseData;
use super::CredentialsRequestBody;
use crate::inbound::http::router::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequestBody>,
) -> Result<ApiSuccess<AuthResponseData>, ApiError> {
    state
        .identity_service
        .register(body.try_into_credentials()?)
        .await
        .map_err(ApiError::from)
        .map(|ref result| ApiSuccess::new(StatusCode::OK, result.into()))
}
