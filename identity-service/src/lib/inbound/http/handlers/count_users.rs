use axum::extract::State;
use axum::http::StatusCode;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::router::AppState;

pub async fn count_users(
    State(state): State<AppState>,
) -> Result<ApiSuccess<u64>, ApiError> {
    state
        .identity_service
        .count_identities()
        .await
        .map_err(ApiError::from)
        .map(|count| ApiSuccess::new(StatusCode::OK, count))
}
