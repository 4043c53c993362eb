use std::sync::Arc;
use std::time::Duration;

use auth::TokenIssuer;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::count_users::count_users;
use super::handlers::delete_user::delete_user;
use super::handlers::get_profile::get_profile;
use super::handlers::get_user::get_user;
use super::handlers::list_users::list_users;
use super::handlers::login::login;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::update_profile::update_profile;
use super::handlers::update_user::update_user;
use super::middleware::authenticate as auth_middleware;
use super::middleware::require_admin;
use crate::identity::ports::IdentityServicePort;

#[derive(Clone)]
pub struct AppState {
    pub identity_service: Arc<dyn IdentityServicePort>,
    pub token_issuer: Arc<TokenIssuer>,
}

pub fn create_router(
    identity_service: Arc<dyn IdentityServicePort>,
    token_issuer: Arc<TokenIssuer>,
) -> Router {
    let state = AppState {
        identity_service,
        token_issuer,
    };

    let public_routes = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh));

    let protected_routes = Router::new()
        .route("/api/profile", get(get_profile))
        .route("/api/profile", patch(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Layer order matters: authenticate runs first, then the role check
    let admin_routes = Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/count", get(count_users))
        .route("/api/users/:identity_id", get(get_user))
        .route("/api/users/:identity_id", patch(update_user))
        .route("/api/users/:identity_id", delete(delete_user))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Spans deliberately omit request headers: Authorization carries tokens
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
