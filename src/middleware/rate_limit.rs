use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

use crate::config::RateLimitPolicy;
use crate::error::{AppError, AppResult};

/// Source of wall-clock milliseconds. Injected so tests can move time forward.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Storage for request timestamps, keyed by `"<action>:<client>"`.
///
/// The in-memory implementation is process-local: with N server processes every process admits
/// up to `limit` requests on its own, so the effective limit becomes `limit * N`. A shared
/// backend (e.g. a keyed counter service) can be plugged in by implementing this trait.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn get(&self, key: &str) -> Vec<i64>;
    async fn set(&self, key: &str, timestamps: Vec<i64>);
    /// Drops timestamps older than `cutoff_ms` and forgets keys left empty.
    async fn purge_before(&self, cutoff_ms: i64);
}

#[derive(Default)]
pub struct MemoryBucketStore {
    buckets: RwLock<HashMap<String, Vec<i64>>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.read().await.is_empty()
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn get(&self, key: &str) -> Vec<i64> {
        self.buckets.read().await.get(key).cloned().unwrap_or_default()
    }

    async fn set(&self, key: &str, timestamps: Vec<i64>) {
        self.buckets.write().await.insert(key.to_string(), timestamps);
    }

    async fn purge_before(&self, cutoff_ms: i64) {
        let mut buckets = self.buckets.write().await;
        buckets.retain(|_, timestamps| {
            timestamps.retain(|&t| t >= cutoff_ms);
            !timestamps.is_empty()
        });
    }
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: usize,
}

/// Fixed-window limiter over an injected [`BucketStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    // Serializes get/filter/set so that two requests in this process cannot both pass the check
    // on the same snapshot. Offers nothing across processes.
    guard: Arc<Mutex<()>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, guard: Arc::new(Mutex::new(())) }
    }

    /// Process-local limiter using the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBucketStore::new()), Arc::new(SystemClock))
    }

    /// Records an attempt for `key` unless `limit` attempts already happened in the last
    /// `window_ms` milliseconds. Rejected attempts are not recorded.
    pub async fn check(&self, key: &str, limit: usize, window_ms: i64) -> RateLimitDecision {
        let _serial = self.guard.lock().await;
        let now = self.clock.now_ms();

        let mut recent = self.store.get(key).await;
        // Timestamps from the future (clock moved backwards) are kept; dropping them would let
        // extra requests through.
        recent.retain(|&t| now - t < window_ms);

        if recent.len() >= limit {
            self.store.set(key, recent).await;
            return RateLimitDecision { allowed: false, remaining: 0 };
        }

        recent.push(now);
        let remaining = limit.saturating_sub(recent.len());
        self.store.set(key, recent).await;
        RateLimitDecision { allowed: true, remaining }
    }

    /// Checks `action` for `client` and turns a rejection into [`AppError::RateLimited`].
    pub async fn enforce(
        &self,
        action: &str,
        client: &str,
        policy: RateLimitPolicy,
    ) -> AppResult<RateLimitDecision> {
        let key = format!("{}:{}", action, client);
        let decision = self.check(&key, policy.limit, policy.window_ms).await;
        if decision.allowed {
            Ok(decision)
        } else {
            tracing::warn!(action, client, "Rate limit exceeded");
            Err(AppError::RateLimited("Too many attempts. Try again later.".to_string()))
        }
    }

    /// Forgets timestamps that are older than `max_window_ms` and thus irrelevant to any policy.
    pub async fn cleanup(&self, max_window_ms: i64) {
        let _serial = self.guard.lock().await;
        let cutoff = self.clock.now_ms() - max_window_ms;
        self.store.purge_before(cutoff).await;
    }
}
