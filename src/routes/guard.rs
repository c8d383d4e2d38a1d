use axum::http::HeaderMap;

use crate::config::RateLimitPolicy;
use crate::error::{AppError, AppResult};
use crate::middleware::{csrf, session::SessionClaims};
use crate::state::AppState;

/// Checks every state-changing admin request must pass before touching the database:
/// the per-client rate limit for `action` first, then the CSRF double-submit check.
pub async fn guard_mutation(
    state: &AppState,
    action: &str,
    policy: RateLimitPolicy,
    client: &str,
    headers: &HeaderMap,
) -> AppResult<()> {
    if let Err(e) = state.rate_limiter.enforce(action, client, policy).await {
        state.metrics.inc_rate_limited();
        return Err(e);
    }
    if !csrf::verify(headers) {
        state.metrics.inc_csrf_rejected();
        tracing::warn!(action, client, "CSRF check failed");
        return Err(AppError::CsrfMismatch("Invalid CSRF token".to_string()));
    }
    Ok(())
}

/// Turns an optional session into a 401 when absent.
pub fn require_session(session: Option<SessionClaims>) -> AppResult<SessionClaims> {
    session.ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))
}
