//! Mailcast API - REST API server
//!
//! This crate exposes the settings document, the SMTP relay checks and the
//! campaign lifecycle over HTTP.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
