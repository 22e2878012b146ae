//! Repository layer for data access

pub mod campaigns;
pub mod contact_lists;
pub mod memory;
pub mod settings;
pub mod smtp_config;
pub mod templates;

pub use memory::MemorySettingsRepository;
pub use settings::{DbSettingsRepository, SettingsRepository};

use mailcast_common::Error;

/// Map a driver error into the shared error type
pub(crate) fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}
