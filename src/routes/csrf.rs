use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::middleware::csrf;
use crate::state::AppState;
use crate::types::CsrfTokenResponse;

/// `GET /api/csrf`: issues a fresh token as cookie and in the body.
pub async fn issue_token(State(state): State<AppState>) -> Response {
    let token = csrf::generate_token();
    let cookie = csrf::token_cookie(&token, state.config.auth.secure_cookies);
    ([(header::SET_COOKIE, cookie)], Json(CsrfTokenResponse { token })).into_response()
}
