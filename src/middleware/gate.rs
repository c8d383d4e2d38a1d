//! Edge gate: the first stage every request passes through.
//!
//! 1. Host canonicalization. Requests for a host that is neither local nor the canonical domain
//!    (with or without `www.`) are redirected to the same path on the canonical domain. This runs
//!    for every path, protected or not, and wins over the auth check.
//! 2. Admin auth. Paths under the admin prefix, except the public allowlist, need a valid session
//!    cookie; otherwise the client is sent to the login page with `next=<original path+query>`.
//! 3. Everything else passes through untouched.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::session::SessionKeys;
use crate::config::AppConfig;
use crate::state::AppState;

/// Terminal state of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    /// Wrong host; redirect to this absolute URL on the canonical domain.
    Redirect(String),
    /// Protected path without a valid session; redirect to this login URL.
    RedirectLogin(String),
}

#[derive(Debug, Clone)]
pub struct EdgeGate {
    canonical_domain: String,
    local_hosts: Vec<String>,
    admin_prefix: String,
    login_path: String,
    public_paths: Vec<String>,
}

impl EdgeGate {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            canonical_domain: cfg.site.canonical_domain.trim().to_ascii_lowercase(),
            local_hosts: cfg.site.local_hosts.iter().map(|h| h.to_ascii_lowercase()).collect(),
            admin_prefix: cfg.auth.admin_prefix.clone(),
            login_path: cfg.auth.login_path.clone(),
            public_paths: cfg.auth.public_paths.iter().filter_map(|p| canonical_path(p)).collect(),
        }
    }

    pub fn decide(&self, sessions: &SessionKeys, headers: &HeaderMap, uri: &Uri) -> GateDecision {
        let host = request_host(headers, uri);
        if !self.host_allowed(&host) {
            let scheme = forwarded_scheme(headers);
            let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            return GateDecision::Redirect(format!("{}://{}{}", scheme, self.canonical_domain, path_and_query));
        }

        let path = uri.path();
        if !self.is_protected(path) {
            return GateDecision::Allow;
        }

        match sessions.verify_headers(headers) {
            Ok(Some(_)) => GateDecision::Allow,
            Ok(None) => GateDecision::RedirectLogin(self.login_redirect(uri)),
            Err(e) => {
                tracing::debug!(path, "Session rejected at gate: {}", e);
                GateDecision::RedirectLogin(self.login_redirect(uri))
            }
        }
    }

    /// An empty host header is let through; there is nothing to canonicalize.
    pub fn host_allowed(&self, host: &str) -> bool {
        if host.is_empty() {
            return true;
        }
        let name = strip_port(host);
        if self.local_hosts.iter().any(|h| h == name) {
            return true;
        }
        name == self.canonical_domain
            || name.strip_prefix("www.").is_some_and(|rest| rest == self.canonical_domain)
    }

    /// Matches on the path the static file service would actually resolve, so encoded or
    /// non-normalized spellings of an admin page are protected too. Paths that cannot be
    /// resolved (e.g. containing `..`) are treated as protected.
    pub fn is_protected(&self, raw_path: &str) -> bool {
        let Some(path) = canonical_path(raw_path) else {
            return true;
        };
        let under_prefix = path == self.admin_prefix
            || path.strip_prefix(self.admin_prefix.as_str()).is_some_and(|rest| rest.starts_with('/'));
        if !under_prefix {
            return false;
        }
        !self.public_paths.iter().any(|p| *p == path)
    }

    fn login_redirect(&self, uri: &Uri) -> String {
        let original = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
        let next: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
        format!("{}?next={}", self.login_path, next)
    }
}

fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|hv| hv.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:3000
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split_once(':').map(|(name, _)| name).unwrap_or(host)
}

fn forwarded_scheme(headers: &HeaderMap) -> &'static str {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|hv| hv.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase());
    match proto.as_deref() {
        Some("http") => "http",
        _ => "https",
    }
}

/// Percent-decodes once and drops empty and `.` segments, the way `ServeDir` maps a request
/// path onto the filesystem. `None` for `..` segments and undecodable input.
fn canonical_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut path = String::with_capacity(decoded.len());
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s => {
                path.push('/');
                path.push_str(s);
            }
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    Some(path)
}

/// Axum middleware running the gate in front of the whole router.
pub async fn edge_gate_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match state.gate.decide(&state.sessions, req.headers(), req.uri()) {
        GateDecision::Allow => next.run(req).await,
        GateDecision::Redirect(location) => {
            tracing::info!(path = req.uri().path(), %location, "Redirecting to canonical host");
            state.metrics.inc_gate_host_redirects();
            Redirect::temporary(&location).into_response()
        }
        GateDecision::RedirectLogin(location) => {
            tracing::debug!(path = req.uri().path(), "Unauthenticated admin request, redirecting to login");
            state.metrics.inc_gate_login_redirects();
            Redirect::temporary(&location).into_response()
        }
    }
}
