//! Price API Service Library
//!
//! Exposes configuration and the HTTP router for the binary and for tests.

pub mod config;
pub mod routes;

pub use config::Config;
pub use routes::{create_router, AppState};
