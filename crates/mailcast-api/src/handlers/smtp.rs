//! SMTP relay handlers
//!
//! Both endpoints answer `{ success, error? }`, with 400 on failure.

use axum::{extract::State, http::StatusCode, Json};
use mailcast_core::TransportError;
use mailcast_storage::models::{EmailContact, SmtpSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SmtpResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for a single send
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub contact: EmailContact,
    pub subject: String,
    pub content: String,
    pub smtp_config: SmtpSettings,
}

fn respond(result: Result<(), TransportError>) -> (StatusCode, Json<SmtpResponse>) {
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(SmtpResponse {
                success: true,
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(SmtpResponse {
                success: false,
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Check a relay configuration
///
/// POST /api/verify-smtp
pub async fn verify_smtp(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<SmtpSettings>,
) -> (StatusCode, Json<SmtpResponse>) {
    let result = state.controller.verify_smtp(&settings).await;
    match &result {
        Ok(()) => info!(host = %settings.host, "SMTP settings verified"),
        Err(e) => warn!(host = %settings.host, error = %e, "SMTP verification failed"),
    }
    respond(result)
}

/// Send one message
///
/// POST /api/send-email
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendEmailRequest>,
) -> (StatusCode, Json<SmtpResponse>) {
    let result = state
        .controller
        .send_one(
            &request.contact,
            &request.subject,
            &request.content,
            &request.smtp_config,
        )
        .await;
    if let Err(e) = &result {
        warn!(to = %request.contact.email, error = %e, "Failed to send email");
    }
    respond(result)
}
