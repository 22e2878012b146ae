//! Campaign Lifecycle Controller - binds user actions to the engine and store

use super::{CampaignEngine, CampaignError, RunSummary};
use crate::store::{CampaignStore, SettingsStore};
use crate::transport::{MailTransport, TransportError};
use chrono::{SecondsFormat, Utc};
use mailcast_common::types::{new_id, ContactListId, TemplateId};
use mailcast_storage::models::{
    Campaign, CampaignStatus, EmailContact, RecipientError, SettingsAction, SettingsBundle,
    SmtpSettings,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Fields of a campaign to create
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub template_id: TemplateId,
    #[serde(default)]
    pub contact_list_ids: Vec<ContactListId>,
    /// Single-list form sent by older clients
    #[serde(default)]
    pub contact_list_id: Option<ContactListId>,
}

/// Campaign lifecycle controller
pub struct CampaignController {
    store: Arc<SettingsStore>,
    engine: Arc<CampaignEngine>,
    transport: Arc<dyn MailTransport>,
}

impl CampaignController {
    pub fn new(store: Arc<SettingsStore>, transport: Arc<dyn MailTransport>) -> Self {
        let engine = Arc::new(CampaignEngine::new(store.clone(), transport.clone()));
        Self {
            store,
            engine,
            transport,
        }
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<CampaignEngine> {
        &self.engine
    }

    /// Create a draft campaign.
    ///
    /// `totalCount` is the size of the selected lists right now; it is not
    /// updated if the lists change later.
    pub async fn create(&self, input: NewCampaign) -> Result<Campaign, CampaignError> {
        let contact_list_ids =
            Campaign::normalize_list_ids(Some(input.contact_list_ids), input.contact_list_id);

        if input.name.trim().is_empty()
            || input.subject.trim().is_empty()
            || input.template_id.is_empty()
            || contact_list_ids.is_empty()
        {
            return Err(CampaignError::Invalid("Please fill in all fields".to_string()));
        }

        let not_found =
            || CampaignError::Invalid("Selected template or contact list not found".to_string());

        let template = self
            .store
            .template(&input.template_id)
            .await
            .ok_or_else(not_found)?;

        let mut total_count: u32 = 0;
        for list_id in &contact_list_ids {
            let list = self
                .store
                .contact_list(list_id)
                .await
                .ok_or_else(not_found)?;
            total_count += u32::try_from(list.contacts.len()).unwrap_or(u32::MAX);
        }

        let campaign = Campaign {
            id: new_id(),
            name: input.name,
            subject: input.subject,
            template_id: Some(template.id),
            template_name: Some(template.name),
            contact_list_ids,
            status: CampaignStatus::Draft,
            sent_count: 0,
            total_count,
            create_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error: None,
        };

        self.store.insert(campaign.clone()).await?;

        info!(campaign_id = %campaign.id, total_count, "Campaign created");
        Ok(campaign)
    }

    /// Run a campaign with the current relay settings.
    ///
    /// The run is its own task: it reaches its last recipient and writes its
    /// outcome even if the caller stops waiting.
    pub async fn start(&self, id: &str) -> Result<RunSummary, CampaignError> {
        let smtp = self.store.smtp_settings().await;
        let engine = Arc::clone(&self.engine);
        let campaign_id = id.to_string();

        tokio::spawn(async move { engine.start(&campaign_id, &smtp).await })
            .await
            .map_err(|e| {
                error!(campaign_id = %id, error = %e, "Campaign run task failed");
                CampaignError::RunAborted(e.to_string())
            })?
    }

    /// Run a campaign again from its first recipient
    pub async fn retry(&self, id: &str) -> Result<RunSummary, CampaignError> {
        info!(campaign_id = %id, "Retrying campaign");
        self.start(id).await
    }

    pub async fn pause(&self, id: &str) -> Result<(), CampaignError> {
        self.engine.pause(id).await
    }

    /// Delete a campaign and its recorded errors
    pub async fn delete(&self, id: &str) -> Result<(), CampaignError> {
        let campaign = self
            .store
            .find_by_id(id)
            .await
            .ok_or(CampaignError::NotFound)?;

        if campaign.status == CampaignStatus::Sending || self.engine.is_running(id) {
            return Err(CampaignError::DeleteWhileSending);
        }

        self.store.remove(id).await?;

        info!(campaign_id = %id, "Campaign deleted");
        Ok(())
    }

    /// Errors recorded by the campaign's latest run
    pub async fn errors(&self, id: &str) -> Result<Vec<RecipientError>, CampaignError> {
        self.store
            .find_by_id(id)
            .await
            .map(|campaign| campaign.errors())
            .ok_or(CampaignError::NotFound)
    }

    /// Apply client-posted settings changes
    pub async fn apply_settings(&self, actions: Vec<SettingsAction>) -> Result<(), CampaignError> {
        for action in &actions {
            if let SettingsAction::DeleteCampaign(id) = action {
                if self.engine.is_running(id) {
                    return Err(CampaignError::DeleteWhileSending);
                }
            }
        }

        self.store.apply_from_client(actions).await?;
        Ok(())
    }

    /// Replace the whole settings document posted by a client
    pub async fn replace_settings(&self, bundle: SettingsBundle) -> Result<(), CampaignError> {
        let current = self.store.snapshot().await;
        let drops_running = current.campaigns.iter().any(|campaign| {
            (campaign.status == CampaignStatus::Sending || self.engine.is_running(&campaign.id))
                && bundle.campaign(&campaign.id).is_none()
        });
        if drops_running {
            return Err(CampaignError::DeleteWhileSending);
        }

        self.store.replace(bundle).await?;
        Ok(())
    }

    /// Check a relay configuration without sending anything
    pub async fn verify_smtp(&self, settings: &SmtpSettings) -> Result<(), TransportError> {
        self.transport.verify(settings).await
    }

    /// Send one ad-hoc message
    pub async fn send_one(
        &self,
        recipient: &EmailContact,
        subject: &str,
        html: &str,
        settings: &SmtpSettings,
    ) -> Result<(), TransportError> {
        self.transport.send(recipient, subject, html, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{Notice, NoticeLevel};
    use crate::transport::testing::ScriptedTransport;
    use mailcast_storage::models::{ContactList, Template};
    use mailcast_storage::repository::MemorySettingsRepository;
    use pretty_assertions::assert_eq;

    fn list(id: &str, size: usize) -> ContactList {
        ContactList {
            id: id.to_string(),
            name: format!("List {}", id),
            contacts: (1..=size)
                .map(|n| EmailContact {
                    id: n.to_string(),
                    name: format!("Person {}", n),
                    email: format!("{}{}@example.com", id, n),
                })
                .collect(),
        }
    }

    fn bundle() -> SettingsBundle {
        SettingsBundle {
            templates: vec![Template {
                id: "t1".to_string(),
                name: "Greeting".to_string(),
                content: "Hi {{name}}".to_string(),
            }],
            contact_lists: vec![list("a", 2), list("b", 3), list("empty", 0)],
            campaigns: Vec::new(),
            smtp_config: SmtpSettings {
                host: "smtp.example.com".to_string(),
                username: "user".to_string(),
                password: "secret".to_string(),
                from_email: "no-reply@example.com".to_string(),
                from_name: "System".to_string(),
                ..Default::default()
            },
        }
    }

    async fn controller_with(
        bundle: SettingsBundle,
        transport: ScriptedTransport,
    ) -> (CampaignController, Arc<ScriptedTransport>) {
        let repo = Arc::new(MemorySettingsRepository::with_bundle(bundle));
        let store = Arc::new(SettingsStore::load(repo).await.unwrap());
        let transport = Arc::new(transport);
        (CampaignController::new(store, transport.clone()), transport)
    }

    fn new_campaign(lists: &[&str]) -> NewCampaign {
        NewCampaign {
            name: "Launch".to_string(),
            subject: "Hello".to_string(),
            template_id: "t1".to_string(),
            contact_list_ids: lists.iter().map(|l| l.to_string()).collect(),
            contact_list_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_snapshots_total_count() {
        let (controller, _) = controller_with(bundle(), ScriptedTransport::new()).await;

        let campaign = controller.create(new_campaign(&["a", "b"])).await.unwrap();

        assert_eq!(campaign.total_count, 5);
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.sent_count, 0);
        assert_eq!(campaign.template_name.as_deref(), Some("Greeting"));
        assert!(chrono::DateTime::parse_from_rfc3339(&campaign.create_date).is_ok());
        assert_eq!(
            controller.store().find_by_id(&campaign.id).await,
            Some(campaign)
        );
    }

    #[tokio::test]
    async fn test_create_accepts_single_list_field() {
        let (controller, _) = controller_with(bundle(), ScriptedTransport::new()).await;

        let input = NewCampaign {
            contact_list_ids: Vec::new(),
            contact_list_id: Some("b".to_string()),
            ..new_campaign(&[])
        };
        let campaign = controller.create(input).await.unwrap();

        assert_eq!(campaign.contact_list_ids, vec!["b".to_string()]);
        assert_eq!(campaign.total_count, 3);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (controller, _) = controller_with(bundle(), ScriptedTransport::new()).await;

        let err = controller
            .create(NewCampaign {
                subject: "  ".to_string(),
                ..new_campaign(&["a"])
            })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Please fill in all fields");

        let err = controller.create(new_campaign(&[])).await.unwrap_err();
        assert_eq!(err.user_message(), "Please fill in all fields");

        let err = controller
            .create(new_campaign(&["a", "missing"]))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Selected template or contact list not found");
        assert!(controller.store().snapshot().await.campaigns.is_empty());
    }

    #[tokio::test]
    async fn test_start_uses_stored_smtp_settings() {
        let mut b = bundle();
        b.smtp_config.host = String::new();
        let (controller, transport) = controller_with(b, ScriptedTransport::new()).await;
        let campaign = controller.create(new_campaign(&["a"])).await.unwrap();

        let err = controller.start(&campaign.id).await.unwrap_err();

        assert_eq!(
            Notice::from(&err),
            Notice::error("Please configure SMTP settings first")
        );
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_start_with_empty_list_leaves_status() {
        let (controller, transport) = controller_with(bundle(), ScriptedTransport::new()).await;
        let campaign = controller.create(new_campaign(&["a", "empty"])).await.unwrap();

        let err = controller.start(&campaign.id).await.unwrap_err();

        assert!(err.is_precondition());
        assert!(transport.attempts().is_empty());
        assert_eq!(
            controller.store().find_by_id(&campaign.id).await.unwrap().status,
            CampaignStatus::Draft
        );
    }

    #[tokio::test]
    async fn test_retry_resends_everything() {
        let transport = ScriptedTransport::new()
            .fail_for("a1@example.com", "refused")
            .fail_for("a2@example.com", "refused");
        let (controller, transport) = controller_with(bundle(), transport).await;
        let campaign = controller.create(new_campaign(&["a"])).await.unwrap();

        let first = controller.start(&campaign.id).await.unwrap();
        assert_eq!(first.status, CampaignStatus::Failed);
        assert_eq!(first.notice().level, NoticeLevel::Error);

        let second = controller.retry(&campaign.id).await.unwrap();
        assert_eq!(second.failed, 2);
        assert_eq!(transport.attempts().len(), 4);
        assert_eq!(controller.errors(&campaign.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_outlives_dropped_caller() {
        let transport = ScriptedTransport::new().hold_after(1);
        let gate = transport.gate();
        let (controller, transport) = controller_with(bundle(), transport).await;
        let controller = Arc::new(controller);
        let campaign = controller.create(new_campaign(&["a", "b"])).await.unwrap();

        let caller = {
            let controller = controller.clone();
            let id = campaign.id.clone();
            tokio::spawn(async move { controller.start(&id).await })
        };
        gate.reached().await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        gate.release();

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while controller.engine().is_running(&campaign.id) {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let stored = controller.store().find_by_id(&campaign.id).await.unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert_eq!(stored.sent_count, 5);
        assert_eq!(transport.attempts().len(), 5);
        controller.delete(&campaign.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_rejected_while_sending() {
        let mut b = bundle();
        b.campaigns.push(Campaign {
            id: "c1".to_string(),
            name: "Launch".to_string(),
            subject: "Hello".to_string(),
            template_id: Some("t1".to_string()),
            template_name: None,
            contact_list_ids: vec!["a".to_string()],
            status: CampaignStatus::Sending,
            sent_count: 1,
            total_count: 2,
            create_date: "2024-01-01T00:00:00.000Z".to_string(),
            error: None,
        });
        let (controller, _) = controller_with(b, ScriptedTransport::new()).await;

        let err = controller.delete("c1").await.unwrap_err();
        assert!(matches!(err, CampaignError::DeleteWhileSending));
        assert!(controller.store().find_by_id("c1").await.is_some());

        let err = controller
            .apply_settings(vec![SettingsAction::DeleteCampaign("c1".to_string())])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let err = controller
            .replace_settings(bundle())
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::DeleteWhileSending));
        assert!(controller.store().find_by_id("c1").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_removes_campaign() {
        let (controller, _) = controller_with(bundle(), ScriptedTransport::new()).await;
        let campaign = controller.create(new_campaign(&["a"])).await.unwrap();

        controller.delete(&campaign.id).await.unwrap();

        assert!(controller.store().find_by_id(&campaign.id).await.is_none());
        let err = controller.delete(&campaign.id).await.unwrap_err();
        assert!(matches!(err, CampaignError::NotFound));
    }

    #[tokio::test]
    async fn test_verify_smtp_passes_through() {
        let (controller, _) =
            controller_with(bundle(), ScriptedTransport::new().fail_verify("connection refused"))
                .await;

        let err = controller
            .verify_smtp(&SmtpSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to connect: connection refused");
    }
}
