//! HTTP JSON API for the exam-prep service.
//!
//! ```text
//! axum handlers (routes/)  ──▶  services (sessions, study, auth, AI)  ──▶  storage
//! ```

#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod router;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{AppConfig, ConfigError, Environment};
pub use error::ApiError;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use router::build_router;
pub use server::serve;
pub use state::{AppState, SharedState};
