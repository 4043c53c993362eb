use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::AuthResponseData;
use crate::inbound::http::router::AppState;

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequestBody>,
) -> Result<ApiSuccess<AuthResponseData>, ApiError> {
    state
        .identity_service
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiError::from)
        .map(|ref result| ApiSuccess::new(StatusCode::OK, result.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshRequestBody {
    #[serde(default)]
    refresh_token: String,
}
