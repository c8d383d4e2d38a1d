//! Integration and unit tests for the Brightline backend.
//!
//! ## Test Modules
//!
//! - **support**: shared fixtures (temporary database and static site, request helpers)
//! - **gate_api_tests**: edge gate behaviour through the full router
//! - **auth_api_tests**: CSRF issuance, login, logout and session lookup
//! - **users_api_tests**: admin account management and its guards
//! - **health_api_tests**: health, readiness, metrics and version endpoints
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error-to-response mapping
//! - **db_tests**: schema initialization
//!
//! Individual modules can be run with e.g. `cargo test gate_api_tests`.

pub mod support;

pub mod users_api_tests;
