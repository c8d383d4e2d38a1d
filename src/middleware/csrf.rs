//! Cross-Site Request Forgery (CSRF) protection.
//!
//! Double-submit pattern: `/api/csrf` hands out a random token both as an HTTP-only cookie and in
//! the response body. Client scripts echo the body value in the `x-csrf-token` header and every
//! state-changing admin endpoint requires cookie and header to match exactly. Tokens are neither
//! rotated nor single-use; one token backs any number of requests for the cookie's lifetime.

use axum::http::HeaderMap;
use rand::RngCore;
use subtle::ConstantTimeEq;

use super::session::{cookie_value, secure_suffix};

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Number of random bytes in a token (hex-encoded, so twice as many characters).
const TOKEN_BYTES: usize = 32;

/// Generates an unpredictable, cookie-safe token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// `Set-Cookie` value that stores `token` for later comparison.
pub fn token_cookie(token: &str, secure: bool) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax{}", CSRF_COOKIE, token, secure_suffix(secure))
}

/// Returns `true` only if the cookie and header are both present, non-empty and identical.
pub fn verify(headers: &HeaderMap) -> bool {
    let Some(cookie) = cookie_value(headers, CSRF_COOKIE) else {
        return false;
    };
    let header = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()).unwrap_or("");
    if header.is_empty() {
        return false;
    }
    bool::from(header.as_bytes().ct_eq(cookie.as_bytes()))
}
