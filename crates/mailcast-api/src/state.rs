//! Shared handler state

use mailcast_core::{CampaignController, SettingsStore};
use mailcast_storage::DatabasePool;
use std::sync::Arc;

/// Application state shared by all handlers
pub struct AppState {
    pub controller: Arc<CampaignController>,
    /// Absent when running on the in-memory backend
    pub db_pool: Option<DatabasePool>,
}

impl AppState {
    pub fn new(controller: Arc<CampaignController>, db_pool: Option<DatabasePool>) -> Self {
        Self {
            controller,
            db_pool,
        }
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        self.controller.store()
    }
}
