use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::inbound::http::router::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
) -> Result<ApiSuccess<Vec<IdentityData>>, ApiError> {
    let identities = state
        .identity_service
        .list_identities(params.search.as_deref())
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        identities.iter().map(IdentityData::from).collect(),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListUsersParams {
    search: Option<String>,
}
