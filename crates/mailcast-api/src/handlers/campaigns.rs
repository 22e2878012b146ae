//! Campaign handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mailcast_core::{NewCampaign, Notice, RunSummary};
use mailcast_storage::models::{Campaign, RecipientError};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::{campaign_error, ApiError};
use crate::state::AppState;

/// Created campaign with its notice
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub campaign: Campaign,
    pub notice: Notice,
}

/// Outcome of a run with its notice
#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub notice: Notice,
}

#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    pub notice: Notice,
}

impl From<RunSummary> for RunResponse {
    fn from(summary: RunSummary) -> Self {
        let notice = summary.notice();
        Self { summary, notice }
    }
}

/// Create a draft campaign
///
/// POST /api/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewCampaign>,
) -> Result<(StatusCode, Json<CampaignResponse>), ApiError> {
    let campaign = state
        .controller
        .create(input)
        .await
        .map_err(campaign_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CampaignResponse {
            campaign,
            notice: Notice::success("Campaign created successfully"),
        }),
    ))
}

/// Run a campaign; responds when the run is over
///
/// POST /api/campaigns/:id/start
pub async fn start_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    let summary = state.controller.start(&id).await.map_err(campaign_error)?;
    Ok(Json(summary.into()))
}

/// Run a campaign again from scratch
///
/// POST /api/campaigns/:id/retry
pub async fn retry_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    let summary = state.controller.retry(&id).await.map_err(campaign_error)?;
    Ok(Json(summary.into()))
}

/// Pause a sending campaign
///
/// POST /api/campaigns/:id/pause
pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NoticeResponse>, ApiError> {
    state.controller.pause(&id).await.map_err(campaign_error)?;

    Ok(Json(NoticeResponse {
        notice: Notice::success("Campaign paused"),
    }))
}

/// Delete a campaign
///
/// DELETE /api/campaigns/:id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NoticeResponse>, ApiError> {
    state.controller.delete(&id).await.map_err(campaign_error)?;

    info!("Deleted campaign {}", id);

    Ok(Json(NoticeResponse {
        notice: Notice::success("Campaign deleted successfully"),
    }))
}

/// Per-recipient errors of the latest run
///
/// GET /api/campaigns/:id/errors
pub async fn campaign_errors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RecipientError>>, ApiError> {
    let errors = state.controller.errors(&id).await.map_err(campaign_error)?;
    Ok(Json(errors))
}
