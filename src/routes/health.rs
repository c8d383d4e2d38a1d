use crate::{middleware::session::AdminSession, state::AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::time::{Duration, Instant};

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// Health check endpoint - lightweight, no rate limiting
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(DB_PROBE_TIMEOUT, query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// JSON health used by the admin status page
pub async fn api_health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    let outcome = tokio::time::timeout(DB_PROBE_TIMEOUT, query).await;
    let db_latency_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(Ok(_)) => (StatusCode::OK, Json(serde_json::json!({ "ok": true, "db_latency_ms": db_latency_ms }))),
        Ok(Err(e)) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "ok": false, "db_latency_ms": db_latency_ms, "error": "database unavailable" })),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ok": false, "db_latency_ms": db_latency_ms, "error": "database timeout" })),
        ),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>, _session: AdminSession) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>, _session: AdminSession) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP brightline_sessions_issued Admin sessions issued\n# TYPE brightline_sessions_issued counter\nbrightline_sessions_issued {}\n\
# HELP brightline_logins_failed Failed admin logins\n# TYPE brightline_logins_failed counter\nbrightline_logins_failed {}\n\
# HELP brightline_rate_limited Requests rejected by the rate limiter\n# TYPE brightline_rate_limited counter\nbrightline_rate_limited {}\n\
# HELP brightline_csrf_rejected Requests rejected by the CSRF check\n# TYPE brightline_csrf_rejected counter\nbrightline_csrf_rejected {}\n\
# HELP brightline_gate_host_redirects Canonical host redirects\n# TYPE brightline_gate_host_redirects counter\nbrightline_gate_host_redirects {}\n\
# HELP brightline_gate_login_redirects Admin requests redirected to login\n# TYPE brightline_gate_login_redirects counter\nbrightline_gate_login_redirects {}\n\
# HELP brightline_uptime_seconds Uptime seconds\n# TYPE brightline_uptime_seconds gauge\nbrightline_uptime_seconds {}\n",
        m.sessions_issued,
        m.logins_failed,
        m.rate_limited,
        m.csrf_rejected,
        m.gate_host_redirects,
        m.gate_login_redirects,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
