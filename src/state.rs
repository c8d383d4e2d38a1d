use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::middleware::{EdgeGate, RateLimiter, SessionKeys};

/// The shared application state.
///
/// Cheap to clone; handed to every handler and to the stateful middleware layers.
#[derive(Clone)]
pub struct AppState {
    /// Admin account storage.
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    /// Session signer/verifier built from `auth.session_secret`.
    pub sessions: Arc<SessionKeys>,
    /// Host canonicalization and admin-prefix rules.
    pub gate: Arc<EdgeGate>,
    /// Per-action throttling of login and user mutations.
    ///
    /// Process-local unless constructed with a shared bucket store.
    pub rate_limiter: RateLimiter,
    pub metrics: Metrics,
}

impl AppState {
    /// Builds the state with an in-memory rate limiter.
    ///
    /// Fails with a configuration error when no session secret is set, so a misconfigured
    /// server never starts serving.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> AppResult<Self> {
        Self::with_rate_limiter(db, config, RateLimiter::in_memory())
    }

    pub fn with_rate_limiter(db: sqlx::SqlitePool, config: AppConfig, rate_limiter: RateLimiter) -> AppResult<Self> {
        let sessions = SessionKeys::from_config(&config.auth)?;
        let gate = EdgeGate::from_config(&config);
        Ok(Self {
            db,
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            gate: Arc::new(gate),
            rate_limiter,
            metrics: Metrics::new(),
        })
    }
}
