use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the request-gating layer.
#[derive(Clone)]
pub struct Metrics {
    pub sessions_issued: Arc<AtomicU64>,
    pub logins_failed: Arc<AtomicU64>,
    pub rate_limited: Arc<AtomicU64>,
    pub csrf_rejected: Arc<AtomicU64>,
    pub gate_host_redirects: Arc<AtomicU64>,
    pub gate_login_redirects: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_issued: Arc::new(AtomicU64::new(0)),
            logins_failed: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            csrf_rejected: Arc::new(AtomicU64::new(0)),
            gate_host_redirects: Arc::new(AtomicU64::new(0)),
            gate_login_redirects: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_sessions_issued(&self) {
        self.sessions_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_logins_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_rejected(&self) {
        self.csrf_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_gate_host_redirects(&self) {
        self.gate_host_redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_gate_login_redirects(&self) {
        self.gate_login_redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_issued: self.sessions_issued.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            csrf_rejected: self.csrf_rejected.load(Ordering::Relaxed),
            gate_host_redirects: self.gate_host_redirects.load(Ordering::Relaxed),
            gate_login_redirects: self.gate_login_redirects.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub sessions_issued: u64,
    pub logins_failed: u64,
    pub rate_limited: u64,
    pub csrf_rejected: u64,
    pub gate_host_redirects: u64,
    pub gate_login_redirects: u64,
    pub uptime_seconds: u64,
}
