//! Settings store - in-process source of truth mirrored to a repository
//!
//! Every mutation is persisted through the injected [`SettingsRepository`]
//! first and applied to memory only once the write succeeded, so a failed
//! save never leaves the in-process state ahead of storage.

use async_trait::async_trait;
use mailcast_common::types::looks_like_email;
use mailcast_common::{Error, Result};
use mailcast_storage::models::{
    Campaign, CampaignPatch, CampaignStatus, ContactList, SettingsAction, SettingsBundle,
    SmtpSettings, Template,
};
use mailcast_storage::repository::SettingsRepository;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Campaign access used by the send engine
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Option<Campaign>;

    /// Merge a partial update; the latest call wins
    async fn update(&self, id: &str, patch: CampaignPatch) -> Result<()>;

    /// Merge `patch` only if the campaign currently has status `expected`.
    ///
    /// Returns whether the patch was applied. The check and the write happen
    /// under one lock.
    async fn update_if_status(
        &self,
        id: &str,
        expected: CampaignStatus,
        patch: CampaignPatch,
    ) -> Result<bool>;

    async fn template(&self, id: &str) -> Option<Template>;

    async fn contact_list(&self, id: &str) -> Option<ContactList>;

    async fn insert(&self, campaign: Campaign) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<()>;
}

/// Settings store
pub struct SettingsStore {
    state: RwLock<SettingsBundle>,
    repository: Arc<dyn SettingsRepository>,
}

impl SettingsStore {
    /// Load the current settings from the repository
    pub async fn load(repository: Arc<dyn SettingsRepository>) -> Result<Self> {
        let bundle = repository.load().await?;

        info!(
            templates = bundle.templates.len(),
            contact_lists = bundle.contact_lists.len(),
            campaigns = bundle.campaigns.len(),
            "Settings loaded"
        );

        Ok(Self {
            state: RwLock::new(bundle),
            repository,
        })
    }

    /// Copy of the full settings document
    pub async fn snapshot(&self) -> SettingsBundle {
        self.state.read().await.clone()
    }

    /// Current relay settings
    pub async fn smtp_settings(&self) -> SmtpSettings {
        self.state.read().await.smtp_config.clone()
    }

    pub async fn update_smtp_settings(&self, settings: SmtpSettings) -> Result<()> {
        self.apply(vec![SettingsAction::UpdateSmtpConfig(settings)])
            .await
    }

    /// Validate, persist and then apply a batch of mutations atomically
    pub async fn apply(&self, actions: Vec<SettingsAction>) -> Result<()> {
        for action in &actions {
            validate(action)?;
        }

        let mut state = self.state.write().await;
        self.commit(&mut state, &actions).await
    }

    /// Persist `actions` and apply them to `state`, which the caller holds
    /// under the write lock
    async fn commit(&self, state: &mut SettingsBundle, actions: &[SettingsAction]) -> Result<()> {
        let mut next = state.clone();
        for action in actions {
            next.apply(action)?;
        }

        if let Err(e) = self.repository.apply(actions).await {
            error!(error = %e, "Failed to persist settings change");
            return Err(e);
        }

        *state = next;

        debug!(count = actions.len(), "Settings change applied");
        Ok(())
    }

    /// Apply mutations coming from a client.
    ///
    /// Run state (status, progress, errors) belongs to the send engine:
    /// updates drop it, new campaigns start as fresh drafts and a campaign
    /// that is sending cannot be deleted.
    pub async fn apply_from_client(&self, actions: Vec<SettingsAction>) -> Result<()> {
        let mut sanitized = Vec::with_capacity(actions.len());

        for action in actions {
            let action = match action {
                SettingsAction::UpdateCampaign { id, patch } => SettingsAction::UpdateCampaign {
                    id,
                    patch: patch.without_run_state(),
                },
                SettingsAction::AddCampaign(campaign) => {
                    SettingsAction::AddCampaign(fresh_draft(campaign))
                }
                SettingsAction::DeleteCampaign(id) => {
                    if self.is_sending(&id).await {
                        return Err(Error::Conflict(
                            "Cannot delete a campaign while it is sending".to_string(),
                        ));
                    }
                    SettingsAction::DeleteCampaign(id)
                }
                other => other,
            };
            sanitized.push(action);
        }

        self.apply(sanitized).await
    }

    /// Overwrite the whole document.
    ///
    /// Campaigns already known keep their run state; unknown ones become
    /// fresh drafts.
    pub async fn replace(&self, mut bundle: SettingsBundle) -> Result<()> {
        for template in &bundle.templates {
            validate_template(template)?;
        }
        for list in &bundle.contact_lists {
            validate_contact_list(list)?;
        }
        for campaign in &bundle.campaigns {
            bundle.require_template(campaign.template_id.as_deref())?;
        }

        let mut state = self.state.write().await;

        bundle.campaigns = bundle
            .campaigns
            .into_iter()
            .map(|incoming| match state.campaign(&incoming.id) {
                Some(existing) => Campaign {
                    status: existing.status,
                    sent_count: existing.sent_count,
                    error: existing.error.clone(),
                    ..incoming
                },
                None => fresh_draft(incoming),
            })
            .collect();

        if let Err(e) = self.repository.replace(&bundle).await {
            error!(error = %e, "Failed to persist settings document");
            return Err(e);
        }

        *state = bundle;

        info!("Settings document replaced");
        Ok(())
    }

    async fn is_sending(&self, id: &str) -> bool {
        self.state
            .read()
            .await
            .campaign(id)
            .map_or(false, |c| c.status == CampaignStatus::Sending)
    }
}

#[async_trait]
impl CampaignStore for SettingsStore {
    async fn find_by_id(&self, id: &str) -> Option<Campaign> {
        self.state.read().await.campaign(id).cloned()
    }

    async fn update(&self, id: &str, patch: CampaignPatch) -> Result<()> {
        self.apply(vec![SettingsAction::UpdateCampaign {
            id: id.to_string(),
            patch,
        }])
        .await
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected: CampaignStatus,
        patch: CampaignPatch,
    ) -> Result<bool> {
        let mut state = self.state.write().await;

        if state.campaign(id).map(|c| c.status) != Some(expected) {
            return Ok(false);
        }

        let action = SettingsAction::UpdateCampaign {
            id: id.to_string(),
            patch,
        };
        self.commit(&mut state, std::slice::from_ref(&action)).await?;
        Ok(true)
    }

    async fn template(&self, id: &str) -> Option<Template> {
        self.state.read().await.template(id).cloned()
    }

    async fn contact_list(&self, id: &str) -> Option<ContactList> {
        self.state.read().await.contact_list(id).cloned()
    }

    async fn insert(&self, campaign: Campaign) -> Result<()> {
        self.apply(vec![SettingsAction::AddCampaign(campaign)]).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.apply(vec![SettingsAction::DeleteCampaign(id.to_string())])
            .await
    }
}

fn fresh_draft(campaign: Campaign) -> Campaign {
    Campaign {
        status: CampaignStatus::Draft,
        sent_count: 0,
        error: None,
        ..campaign
    }
}

fn validate(action: &SettingsAction) -> Result<()> {
    match action {
        SettingsAction::AddTemplate(template) | SettingsAction::UpdateTemplate(template) => {
            validate_template(template)
        }
        SettingsAction::AddContactList(list) | SettingsAction::UpdateContactList(list) => {
            validate_contact_list(list)
        }
        SettingsAction::AddCampaign(campaign) => {
            if campaign.name.trim().is_empty() || campaign.subject.trim().is_empty() {
                return Err(Error::Validation("Please fill in all fields".to_string()));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_template(template: &Template) -> Result<()> {
    if template.name.trim().is_empty() {
        return Err(Error::Validation("Please enter a template name".to_string()));
    }
    Ok(())
}

fn validate_contact_list(list: &ContactList) -> Result<()> {
    if list.name.trim().is_empty() {
        return Err(Error::Validation("Please enter a list name".to_string()));
    }

    let mut seen = HashSet::new();
    for contact in &list.contacts {
        if contact.name.trim().is_empty() || contact.email.trim().is_empty() {
            return Err(Error::Validation("Name and email are required".to_string()));
        }
        if !looks_like_email(&contact.email) {
            return Err(Error::Validation(format!(
                "Please enter a valid email address: {}",
                contact.email
            )));
        }
        if !seen.insert(contact.email.trim().to_lowercase()) {
            return Err(Error::Validation(format!(
                "Email address already exists: {}",
                contact.email
            )));
        }
    }
    Ok(())
}
