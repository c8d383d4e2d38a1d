//! # Brightline backend library
//!
//! HTTP backend for the Brightline Photography site: serves the public pages and guards the
//! admin area and admin API.
//!
//! ## Request path
//!
//! Every request first meets the edge gate ([`middleware::gate`]), which canonicalizes the host
//! and requires a valid admin session for the admin page prefix. State-changing admin endpoints
//! additionally pass the per-client rate limiter ([`middleware::rate_limit`]) and the CSRF
//! double-submit check ([`middleware::csrf`]) before touching the database. Sessions are signed
//! tokens in an HTTP-only cookie ([`middleware::session`]).
//!
//! ## Modules
//!
//! - [`config`]: layered configuration (embedded defaults, file, environment)
//! - [`db`]: SQLite schema for admin accounts
//! - [`error`]: error type and HTTP mapping
//! - [`metrics`]: counters for the gating layer
//! - [`middleware`]: gate, sessions, CSRF, rate limiting, client identity, security headers
//! - [`password`]: Argon2 hashing
//! - [`routes`]: handlers and [`routes::router`]
//! - [`state`]: shared application state
//! - [`types`]: request/response DTOs

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
