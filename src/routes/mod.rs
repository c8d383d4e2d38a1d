//! HTTP route handlers and the router that ties them to the gating layers.
//!
//! - `auth`: admin login, logout and "who am I"
//! - `csrf`: CSRF token issuance
//! - `guard`: shared checks for state-changing admin endpoints
//! - `health`: health, readiness, metrics and version endpoints
//! - `users`: admin account management

pub mod auth;
pub mod csrf;
pub mod guard;
pub mod health;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::middleware::{gate, security_headers};
use crate::state::AppState;

/// JSON bodies of the admin API are tiny.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the full application: API routes, static site fallback and the gating layers.
///
/// Layer order, outermost first: tracing, security headers, edge gate, compression, body limit.
/// The edge gate therefore sees every request before any handler or static file.
pub fn router(state: AppState) -> Router {
    let static_site = ServeDir::new(&state.config.server.static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/api/health", get(health::api_health))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/csrf", get(csrf::issue_token))
        .route("/api/admin/login", post(auth::login))
        .route("/api/admin/logout", post(auth::logout))
        .route("/api/admin/me", get(auth::me))
        .route("/api/admin/users", get(users::list_users).post(users::create_user))
        .route("/api/admin/users/{id}", patch(users::update_password).delete(users::delete_user))
        .fallback_service(static_site)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(from_fn_with_state(state.clone(), gate::edge_gate_middleware))
        .layer(from_fn_with_state(state, security_headers::security_headers_middleware))
        .layer(TraceLayer::new_for_http())
}
