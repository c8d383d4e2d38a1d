#![cfg(test)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::middleware::{csrf::CSRF_COOKIE, session::SESSION_COOKIE, RateLimiter};
use crate::routes;
use crate::state::AppState;

pub const TEST_SECRET: &str = "integration-test-secret-integration-test";
pub const LOCAL_HOST: &str = "localhost:3000";
pub const TEST_UA: &str = "brightline-tests/1.0";

/// Router plus everything it needs to stay alive for one test.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _db_file: NamedTempFile,
    _site: TempDir,
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    /// Fetches a CSRF token the way the admin pages do; returns the token value.
    pub async fn csrf_token(&self) -> String {
        let res = self.send(get("/api/csrf").body(Body::empty()).unwrap()).await;
        let body = body_json(res).await;
        body["token"].as_str().unwrap().to_string()
    }

    /// Inserts an admin account directly, bypassing the API.
    pub async fn create_user(&self, username: &str, password: &str) -> String {
        let hash = crate::password::hash_password(password.to_string()).await.unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, username, password_hash) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(&hash)
            .execute(&self.state.db)
            .await
            .unwrap();
        id
    }

    /// A session token for `username` signed with the app's keys.
    pub fn session_for(&self, id: &str, username: &str) -> String {
        self.state.sessions.issue(id, username).unwrap()
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.session_secret = TEST_SECRET.to_string();
    cfg
}

pub async fn test_pool(file: &NamedTempFile) -> SqlitePool {
    let url = format!("sqlite://{}", file.path().display());
    let opts = SqliteConnectOptions::from_str(&url).unwrap().create_if_missing(true);
    SqlitePoolOptions::new().max_connections(1).connect_with(opts).await.unwrap()
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    build_app(customize, RateLimiter::in_memory()).await
}

/// App whose rate limiter is supplied by the test (e.g. with a manual clock or a shared store).
pub async fn spawn_app_with_limiter(limiter: RateLimiter) -> TestApp {
    build_app(|_| {}, limiter).await
}

async fn build_app(customize: impl FnOnce(&mut AppConfig), limiter: RateLimiter) -> TestApp {
    let db_file = NamedTempFile::new().unwrap();
    let pool = test_pool(&db_file).await;
    crate::db::init_db(&pool).await.unwrap();

    // Minimal static site so gate pass-through can be observed as 200
    let site = TempDir::new().unwrap();
    for (rel, content) in [
        ("index.html", "<h1>Brightline</h1>"),
        ("admin/index.html", "<h1>Admin</h1>"),
        ("admin/login/index.html", "<h1>Login</h1>"),
        ("admin/media/index.html", "<h1>Media</h1>"),
    ] {
        let path = site.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    let mut cfg = test_config();
    cfg.database.url = format!("sqlite://{}", db_file.path().display());
    cfg.server.static_dir = site.path().display().to_string();
    customize(&mut cfg);

    let state = AppState::with_rate_limiter(pool, cfg, limiter).unwrap();
    let app = routes::router(state.clone());
    TestApp { app, state, _db_file: db_file, _site: site }
}

/// GET builder with the local host and a stable user agent.
pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri).header(header::HOST, LOCAL_HOST).header(header::USER_AGENT, TEST_UA)
}

/// GET builder for an arbitrary `Host`.
pub fn get_on(host: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri).header(header::HOST, host).header(header::USER_AGENT, TEST_UA)
}

pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header(header::HOST, LOCAL_HOST).header(header::USER_AGENT, TEST_UA)
}

/// Builds a JSON request carrying the CSRF pair and, optionally, a session cookie.
pub fn mutation(method: &str, uri: &str, csrf: Option<&str>, session: Option<&str>, body: Value) -> Request<Body> {
    let mut cookies = Vec::new();
    if let Some(t) = csrf {
        cookies.push(format!("{}={}", CSRF_COOKIE, t));
    }
    if let Some(s) = session {
        cookies.push(format!("{}={}", SESSION_COOKIE, s));
    }
    let mut builder = request(method, uri).header(header::CONTENT_TYPE, "application/json");
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies.join("; "));
    }
    if let Some(t) = csrf {
        builder = builder.header("x-csrf-token", t);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn body_text(res: Response<Body>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8_lossy(&bytes).to_string()
}

/// All `Set-Cookie` values of a response.
pub fn set_cookies(res: &Response<Body>) -> Vec<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Value of cookie `name` from a `Set-Cookie` list.
pub fn cookie_from(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies.iter().find_map(|c| {
        let first = c.split(';').next()?;
        let (k, v) = first.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}
