//! API request handlers

pub mod campaigns;
pub mod health;
pub mod settings;
pub mod smtp;

use axum::{http::StatusCode, Json};
use mailcast_core::CampaignError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error: status plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn campaign_error(e: CampaignError) -> ApiError {
    let status = status_from(e.status_code());
    if status.is_server_error() {
        error!(error = %e, "Campaign operation failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.code().to_string(),
            message: e.user_message(),
        }),
    )
}

pub(crate) fn common_error(e: mailcast_common::Error) -> ApiError {
    let status = status_from(e.status_code());
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.code().to_string(),
            message: e.to_string(),
        }),
    )
}
