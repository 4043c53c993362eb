use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::inbound::http::middleware::AuthenticatedIdentity;

pub async fn get_profile(
    Extension(caller): Extension<AuthenticatedIdentity>,
) -> Result<ApiSuccess<IdentityData>, ApiError> {
    Ok(ApiSuccess::new(StatusCode::OK, (&caller.identity).into()))
}
