//! User-facing notices

use mailcast_common::types::CampaignId;
use mailcast_storage::models::{CampaignStatus, RecipientError};
use serde::Serialize;

use super::CampaignError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A single message for the user about an operation's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&CampaignError> for Notice {
    fn from(err: &CampaignError) -> Self {
        Notice::error(err.user_message())
    }
}

/// Outcome of one send run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub campaign_id: CampaignId,
    pub status: CampaignStatus,
    pub sent: u32,
    pub failed: usize,
    /// Recipients in the run, including those skipped by a pause
    pub total: usize,
    pub paused: bool,
    pub errors: Vec<RecipientError>,
}

impl RunSummary {
    /// The one notice reported for the run
    pub fn notice(&self) -> Notice {
        if self.paused {
            return Notice::warning(format!(
                "Campaign paused: {} of {} emails sent",
                self.sent, self.total
            ));
        }

        match self.status {
            CampaignStatus::Failed => Notice::error(format!(
                "Campaign failed: {} errors, 0 sent",
                self.failed
            )),
            CampaignStatus::CompletedWithErrors => Notice::warning(format!(
                "Campaign completed with {} errors, {} sent",
                self.failed, self.sent
            )),
            _ => Notice::success(format!(
                "Campaign completed: {} emails sent successfully",
                self.sent
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary(status: CampaignStatus, sent: u32, failed: usize, paused: bool) -> RunSummary {
        RunSummary {
            campaign_id: "c1".to_string(),
            status,
            sent,
            failed,
            total: 3,
            paused,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_run_notices() {
        assert_eq!(
            summary(CampaignStatus::Completed, 3, 0, false).notice(),
            Notice::success("Campaign completed: 3 emails sent successfully")
        );
        assert_eq!(
            summary(CampaignStatus::CompletedWithErrors, 2, 1, false).notice(),
            Notice::warning("Campaign completed with 1 errors, 2 sent")
        );
        assert_eq!(
            summary(CampaignStatus::Failed, 0, 3, false).notice(),
            Notice::error("Campaign failed: 3 errors, 0 sent")
        );
        assert_eq!(
            summary(CampaignStatus::Draft, 1, 0, true).notice(),
            Notice::warning("Campaign paused: 1 of 3 emails sent")
        );
    }

    #[test]
    fn test_notice_serialization() {
        let value = serde_json::to_value(Notice::success("ok")).unwrap();
        assert_eq!(value, serde_json::json!({"level": "success", "message": "ok"}));
    }
}
