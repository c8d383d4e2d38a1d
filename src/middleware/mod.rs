//! Request gating for the site and admin API.
//!
//! - [`gate`]: edge gate (host canonicalization, admin-prefix auth), runs before every handler
//! - [`session`]: admin session tokens, cookies and extractors
//! - [`csrf`]: double-submit CSRF check for state-changing admin endpoints
//! - [`rate_limit`]: fixed-window limiter over a pluggable bucket store
//! - [`ip`]: client identity used as rate-limit key
//! - [`security_headers`]: response hardening headers

pub mod csrf;
pub mod gate;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod session;

pub use gate::EdgeGate;
pub use rate_limit::RateLimiter;
pub use session::SessionKeys;
