//! Mailcast Storage - Models and persistence
//!
//! This crate holds the campaign, template, contact list and relay models,
//! the PostgreSQL pool with its migrations, and the settings repositories
//! (PostgreSQL and in-memory) behind the `SettingsRepository` port.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
