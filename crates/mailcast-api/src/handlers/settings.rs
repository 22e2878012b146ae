//! Settings document handlers

use axum::{extract::State, http::StatusCode, Json};
use mailcast_storage::models::{SettingsBundle, SettingsDelta};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{campaign_error, common_error, ApiError, ErrorResponse};
use crate::state::AppState;

/// Body of a settings write: an action-tagged delta or a whole document
#[derive(Debug)]
pub enum SettingsUpdate {
    Delta(SettingsDelta),
    Replace(SettingsBundle),
}

impl SettingsUpdate {
    /// A body with a `type` field is a delta, anything else a full document
    pub fn from_json(body: serde_json::Value) -> Result<Self, serde_json::Error> {
        if body.get("type").is_some() {
            serde_json::from_value(body).map(SettingsUpdate::Delta)
        } else {
            serde_json::from_value(body).map(SettingsUpdate::Replace)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Full settings document
///
/// GET /api/settings
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<SettingsBundle> {
    Json(state.store().snapshot().await)
}

/// Apply a delta or overwrite the document
///
/// POST /api/settings
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let update = SettingsUpdate::from_json(body).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "VALIDATION_ERROR".to_string(),
                message: format!("Invalid settings payload: {}", e),
            }),
        )
    })?;

    match update {
        SettingsUpdate::Delta(delta) => {
            let kind = delta.kind;
            let actions = delta.into_actions().map_err(common_error)?;
            state
                .controller
                .apply_settings(actions)
                .await
                .map_err(campaign_error)?;
            info!(action = %kind, "Settings updated");
        }
        SettingsUpdate::Replace(bundle) => {
            state
                .controller
                .replace_settings(bundle)
                .await
                .map_err(campaign_error)?;
            info!("Settings replaced");
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}
