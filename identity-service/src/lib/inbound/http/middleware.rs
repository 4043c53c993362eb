use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;

use auth::TokenPurpose;

use crate::domain::identity::models::IdentityId;
use crate::domain::identity::models::PublicIdentity;
use crate::domain::identity::models::Role;
use crate::inbound::http::router::AppState;

/// Extension type carrying the resolved caller through request extensions.
///
/// Holds the public projection only; the access guard never sees the
/// password hash.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub identity: PublicIdentity,
}

/// The access guard: resolves a bearer token into an authenticated caller.
///
/// Fails closed with 401 on a missing, malformed, expired, or wrong-purpose
/// token, and when the subject no longer exists. Only `access`-purpose tokens
/// pass; a refresh token presented here is rejected. The identity is loaded
/// from the store on every request, so a role change takes effect
/// immediately rather than at token expiry.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let claims = state
        .token_issuer
        .verify(token, TokenPurpose::Access)
        .map_err(|e| {
            tracing::warn!("Access token rejected: {}", e);
            unauthorized("Invalid or expired token")
        })?;

    let identity_id = IdentityId::from_string(&claims.sub)
        .map_err(|_| unauthorized("Invalid token format"))?;

    // The account may have been deleted while the token was still live
    let identity = state
        .identity_service
        .get_identity(&identity_id)
        .await
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(AuthenticatedIdentity { identity });

    Ok(next.run(req).await)
}

/// Statically declared role requirement for admin-only routes.
///
/// Runs behind [`authenticate`], so the caller is already resolved; a
/// non-admin caller gets 403, distinct from the guard's 401.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, Response> {
    let caller = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .ok_or_else(|| unauthorized("Please sign in"))?;

    if caller.identity.role != Role::Admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Only admin can access this resource"
            })),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": message
        })),
    )
        .into_response()
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header"))?;

    if !auth_str.starts_with("Bearer ") {
        return Err(unauthorized(
            "Invalid Authorization header format. Expected: Bearer <token>",
        ));
    }

    Ok(auth_str.trim_start_matches("Bearer "))
}
