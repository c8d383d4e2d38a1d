use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};

use super::guard::guard_mutation;
use crate::error::{AppError, AppResult};
use crate::middleware::{
    ip::ClientKey,
    session::{AdminSession, MaybeAdminSession},
};
use crate::password;
use crate::state::AppState;
use crate::types::{CredentialsRequest, MeResponse, OkResponse, UserRecord};

// Same answer for "no such user" and "wrong password".
fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

/// `POST /api/admin/login`
pub async fn login(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    guard_mutation(&state, "login", state.config.rate_limits.login, &client, &headers).await?;

    // Unparseable bodies count as missing credentials.
    let creds: CredentialsRequest = serde_json::from_slice(&body).unwrap_or_default();
    let username = creds.username.trim();
    if username.is_empty() || creds.password.is_empty() {
        return Err(AppError::BadRequest("Missing credentials".to_string()));
    }

    let user = sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await?;

    let Some(user) = user else {
        state.metrics.inc_logins_failed();
        tracing::info!(%client, "Login failed: unknown user");
        return Err(invalid_credentials());
    };

    if !password::verify_password(creds.password, user.password_hash.clone()).await? {
        state.metrics.inc_logins_failed();
        tracing::info!(%client, user = %user.username, "Login failed: wrong password");
        return Err(invalid_credentials());
    }

    let token = state.sessions.issue(&user.id, &user.username)?;
    state.metrics.inc_sessions_issued();
    tracing::info!(user = %user.username, "Admin logged in");

    Ok(([(header::SET_COOKIE, state.sessions.session_cookie(&token))], Json(OkResponse::ok())).into_response())
}

/// `POST /api/admin/logout`: clears the cookie. The token is not revoked server-side.
pub async fn logout(State(state): State<AppState>, MaybeAdminSession(session): MaybeAdminSession) -> Response {
    if let Some(claims) = session {
        tracing::info!(user = %claims.username, sub = %claims.sub, "Admin logged out");
    }
    ([(header::SET_COOKIE, state.sessions.clear_cookie())], Json(OkResponse::ok())).into_response()
}

/// `GET /api/admin/me`
pub async fn me(AdminSession(claims): AdminSession) -> Json<MeResponse> {
    Json(MeResponse { sub: claims.sub, username: claims.username })
}
