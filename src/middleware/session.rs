//! Admin session tokens.
//!
//! A session is an HS256-signed JWT carried in the `admin_session` cookie. There is no server-side
//! session table: a token stays valid until its embedded expiry or until the signing secret is
//! rotated. Logging out only clears the client's cookie.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "admin_session";
pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session signing is not configured: {0}")]
    Configuration(String),
    #[error("invalid session: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to encode session: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried by an admin session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the admin user's id.
    pub sub: String,
    /// Display name at the time of login.
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens with the server-held secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    secure_cookies: bool,
}

impl SessionKeys {
    /// Builds the signer/verifier. Fails when no secret is configured so that a misconfigured
    /// deployment refuses to start instead of failing on the first protected request.
    pub fn new(secret: &str, ttl_secs: i64, secure_cookies: bool) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::Configuration("session secret is empty".to_string()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
            secure_cookies,
        })
    }

    pub fn from_config(cfg: &AuthConfig) -> Result<Self, SessionError> {
        Self::new(&cfg.session_secret, cfg.session_ttl_secs, cfg.secure_cookies)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issues a token for `subject_id`, valid for the configured TTL from now.
    pub fn issue(&self, subject_id: &str, display_name: &str) -> Result<String, SessionError> {
        let now = Utc::now().timestamp();
        self.issue_at(subject_id, display_name, now)
    }

    pub(crate) fn issue_at(
        &self,
        subject_id: &str,
        display_name: &str,
        issued_at: i64,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            username: display_name.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: issued_at,
            exp: issued_at + self.ttl_secs,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Encode)
    }

    /// Checks signature, expiry and shape of `token`.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(SessionError::Invalid)?;
        let claims = data.claims;
        if claims.sub.is_empty() || claims.role != ADMIN_ROLE {
            return Err(SessionError::Invalid(jsonwebtoken::errors::ErrorKind::InvalidSubject.into()));
        }
        Ok(claims)
    }

    /// Verifies the session cookie carried in `headers`.
    ///
    /// `Ok(None)` means no cookie was sent, which callers treat as "not logged in" rather than as
    /// an error.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Option<SessionClaims>, SessionError> {
        match cookie_value(headers, SESSION_COOKIE) {
            Some(token) => self.verify(&token).map(Some),
            None => Ok(None),
        }
    }

    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            SESSION_COOKIE,
            token,
            self.ttl_secs,
            secure_suffix(self.secure_cookies)
        )
    }

    /// `Set-Cookie` value telling the browser to drop the session cookie.
    ///
    /// The token itself is not revoked; a copy replayed before its expiry still verifies.
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            SESSION_COOKIE,
            secure_suffix(self.secure_cookies)
        )
    }
}

pub(crate) fn secure_suffix(secure: bool) -> &'static str {
    if secure {
        "; Secure"
    } else {
        ""
    }
}

/// Reads a cookie by name from all `Cookie` headers of a request.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k.trim() == name).then(|| v.trim().trim_matches('"').to_string())
        })
        .find(|v| !v.is_empty())
}

/// Extractor for handlers that require a logged-in admin. Rejects with 401.
#[derive(Debug, Clone)]
pub struct AdminSession(pub SessionClaims);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.sessions.verify_headers(&parts.headers) {
            Ok(Some(claims)) => Ok(AdminSession(claims)),
            Ok(None) => Err(AppError::Unauthorized("Not authenticated".to_string())),
            Err(e) => {
                tracing::debug!("Rejected session: {}", e);
                Err(AppError::Unauthorized("Invalid session".to_string()))
            }
        }
    }
}

/// Like [`AdminSession`] but never rejects; `None` when there is no valid session.
#[derive(Debug, Clone)]
pub struct MaybeAdminSession(pub Option<SessionClaims>);

impl FromRequestParts<AppState> for MaybeAdminSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeAdminSession(state.sessions.verify_headers(&parts.headers).ok().flatten()))
    }
}
