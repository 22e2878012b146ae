//! Campaign errors

use thiserror::Error;

/// Campaign lifecycle errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("Contact list {0} not found")]
    ContactListNotFound(String),

    #[error("Campaign has no contact lists")]
    NoContactLists,

    #[error("Template content is empty")]
    BlankTemplate,

    #[error("SMTP host is not configured")]
    MissingSmtpHost,

    #[error("SMTP username and password are required when authentication is enabled")]
    MissingSmtpCredentials,

    #[error("Contact list {0} is empty")]
    EmptyContactList(String),

    #[error("Campaign is already sending")]
    AlreadySending,

    #[error("Campaign is not sending")]
    NotSending,

    #[error("Cannot delete a campaign while it is sending")]
    DeleteWhileSending,

    #[error("{0}")]
    Invalid(String),

    #[error("Campaign run stopped unexpectedly: {0}")]
    RunAborted(String),

    #[error(transparent)]
    Persistence(#[from] mailcast_common::Error),
}

impl CampaignError {
    /// Whether the error was detected before any send attempt
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CampaignError::NotFound
                | CampaignError::TemplateNotFound
                | CampaignError::ContactListNotFound(_)
                | CampaignError::NoContactLists
                | CampaignError::BlankTemplate
                | CampaignError::MissingSmtpHost
                | CampaignError::MissingSmtpCredentials
                | CampaignError::EmptyContactList(_)
        )
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CampaignError::NotFound => 404,
            CampaignError::TemplateNotFound
            | CampaignError::ContactListNotFound(_)
            | CampaignError::NoContactLists
            | CampaignError::BlankTemplate
            | CampaignError::MissingSmtpHost
            | CampaignError::MissingSmtpCredentials
            | CampaignError::EmptyContactList(_)
            | CampaignError::Invalid(_) => 422,
            CampaignError::AlreadySending
            | CampaignError::NotSending
            | CampaignError::DeleteWhileSending => 409,
            CampaignError::RunAborted(_) => 500,
            CampaignError::Persistence(e) => e.status_code(),
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CampaignError::NotFound => "CAMPAIGN_NOT_FOUND",
            CampaignError::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            CampaignError::ContactListNotFound(_) => "CONTACT_LIST_NOT_FOUND",
            CampaignError::NoContactLists => "NO_CONTACT_LISTS",
            CampaignError::BlankTemplate => "BLANK_TEMPLATE",
            CampaignError::MissingSmtpHost => "SMTP_NOT_CONFIGURED",
            CampaignError::MissingSmtpCredentials => "SMTP_CREDENTIALS_MISSING",
            CampaignError::EmptyContactList(_) => "EMPTY_CONTACT_LIST",
            CampaignError::AlreadySending => "ALREADY_SENDING",
            CampaignError::NotSending => "NOT_SENDING",
            CampaignError::DeleteWhileSending => "DELETE_WHILE_SENDING",
            CampaignError::Invalid(_) => "VALIDATION_ERROR",
            CampaignError::RunAborted(_) => "RUN_ABORTED",
            CampaignError::Persistence(e) => e.code(),
        }
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            CampaignError::NotFound
            | CampaignError::TemplateNotFound
            | CampaignError::ContactListNotFound(_)
            | CampaignError::NoContactLists => {
                "Campaign, template, or contact list not found".to_string()
            }
            CampaignError::MissingSmtpHost | CampaignError::MissingSmtpCredentials => {
                "Please configure SMTP settings first".to_string()
            }
            CampaignError::EmptyContactList(_) => "No contacts available to send to".to_string(),
            CampaignError::BlankTemplate => "The selected template has no content".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_precondition_classification() {
        assert!(CampaignError::EmptyContactList("l1".to_string()).is_precondition());
        assert!(CampaignError::MissingSmtpHost.is_precondition());
        assert!(!CampaignError::AlreadySending.is_precondition());
        assert!(!CampaignError::Persistence(mailcast_common::Error::Database("x".into()))
            .is_precondition());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            CampaignError::ContactListNotFound("l1".to_string()).user_message(),
            "Campaign, template, or contact list not found"
        );
        assert_eq!(
            CampaignError::MissingSmtpCredentials.user_message(),
            "Please configure SMTP settings first"
        );
        assert_eq!(
            CampaignError::DeleteWhileSending.user_message(),
            "Cannot delete a campaign while it is sending"
        );
    }

    #[test]
    fn test_aborted_run_is_a_server_error() {
        let err = CampaignError::RunAborted("task panicked".to_string());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.code(), "RUN_ABORTED");
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_persistence_maps_through() {
        let err = CampaignError::from(mailcast_common::Error::NotFound("campaign c1".into()));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
