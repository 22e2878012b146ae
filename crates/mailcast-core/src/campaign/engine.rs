//! Campaign Send Engine - runs a campaign against its contact lists

use super::{CampaignError, RunSummary};
use crate::render::TemplateRenderer;
use crate::store::CampaignStore;
use crate::transport::MailTransport;
use mailcast_common::types::CampaignId;
use mailcast_storage::models::{
    Campaign, CampaignPatch, CampaignStatus, EmailContact, RecipientError, SmtpSettings, Template,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ActiveRuns = Mutex<HashMap<CampaignId, CancellationToken>>;

/// Registration of a running campaign; removed from the registry on drop
struct ActiveRun<'a> {
    runs: &'a ActiveRuns,
    id: CampaignId,
    token: CancellationToken,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Everything a run needs, resolved before the first send
struct RunPlan {
    campaign: Campaign,
    template: Template,
    recipients: Vec<EmailContact>,
}

/// Campaign send engine
///
/// Sends are strictly sequential. A campaign can have one run in flight;
/// pausing cancels it before its next recipient.
pub struct CampaignEngine {
    store: Arc<dyn CampaignStore>,
    transport: Arc<dyn MailTransport>,
    renderer: TemplateRenderer,
    active: ActiveRuns,
}

impl CampaignEngine {
    pub fn new(store: Arc<dyn CampaignStore>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            store,
            transport,
            renderer: TemplateRenderer::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a run of the campaign is in flight in this process
    pub fn is_running(&self, id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Run a campaign to completion (or until paused).
    ///
    /// Preconditions are checked before anything is written. Per-recipient
    /// failures are collected and never stop the run; a failed store write
    /// aborts it.
    pub async fn start(
        &self,
        id: &str,
        smtp: &SmtpSettings,
    ) -> Result<RunSummary, CampaignError> {
        let run = self.register(id)?;
        let plan = self.prepare(id, smtp).await?;

        info!(
            campaign_id = %id,
            name = %plan.campaign.name,
            recipients = plan.recipients.len(),
            "Starting campaign"
        );

        self.store
            .update(
                id,
                CampaignPatch {
                    status: Some(CampaignStatus::Sending),
                    sent_count: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| persistence_failure(id, e))?;

        let mut sent: u32 = 0;
        let mut errors = Vec::new();

        for contact in &plan.recipients {
            if run.token.is_cancelled() {
                info!(campaign_id = %id, sent, "Campaign paused, stopping run");
                break;
            }

            let html = self.renderer.render(&plan.template.content, contact);

            match self
                .transport
                .send(contact, &plan.campaign.subject, &html, smtp)
                .await
            {
                Ok(()) => {
                    sent += 1;
                    debug!(campaign_id = %id, to = %contact.email, sent, "Email sent");
                    self.store
                        .update(id, CampaignPatch::sent_count(sent))
                        .await
                        .map_err(|e| persistence_failure(id, e))?;
                }
                Err(e) => {
                    warn!(campaign_id = %id, to = %contact.email, error = %e, "Failed to send email");
                    errors.push(RecipientError {
                        email: contact.email.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let paused = run.token.is_cancelled();
        let outcome = CampaignStatus::from_outcome(sent, errors.len());

        self.store
            .update(
                id,
                CampaignPatch {
                    status: (!paused).then_some(outcome),
                    sent_count: Some(sent),
                    error: Some(Campaign::encode_errors(&errors)),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| persistence_failure(id, e))?;

        let status = if paused { CampaignStatus::Draft } else { outcome };

        info!(
            campaign_id = %id,
            status = %status,
            sent,
            failed = errors.len(),
            "Campaign run finished"
        );

        Ok(RunSummary {
            campaign_id: id.to_string(),
            status,
            sent,
            failed: errors.len(),
            total: plan.recipients.len(),
            paused,
            errors,
        })
    }

    /// Pause a sending campaign.
    ///
    /// The status goes back to draft right away; an in-flight run finishes
    /// its current recipient and stops. A run that already wrote its final
    /// status is not paused.
    pub async fn pause(&self, id: &str) -> Result<(), CampaignError> {
        let paused = self
            .store
            .update_if_status(
                id,
                CampaignStatus::Sending,
                CampaignPatch::status(CampaignStatus::Draft),
            )
            .await?;

        if !paused {
            return match self.store.find_by_id(id).await {
                Some(_) => Err(CampaignError::NotSending),
                None => Err(CampaignError::NotFound),
            };
        }

        if let Some(token) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            token.cancel();
        }

        info!(campaign_id = %id, "Campaign paused");
        Ok(())
    }

    fn register(&self, id: &str) -> Result<ActiveRun<'_>, CampaignError> {
        let mut runs = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if runs.contains_key(id) {
            return Err(CampaignError::AlreadySending);
        }

        let token = CancellationToken::new();
        runs.insert(id.to_string(), token.clone());

        Ok(ActiveRun {
            runs: &self.active,
            id: id.to_string(),
            token,
        })
    }

    /// Resolve the campaign and check every precondition, in order
    async fn prepare(&self, id: &str, smtp: &SmtpSettings) -> Result<RunPlan, CampaignError> {
        let campaign = self
            .store
            .find_by_id(id)
            .await
            .ok_or(CampaignError::NotFound)?;

        let template = match &campaign.template_id {
            Some(template_id) => self.store.template(template_id).await,
            None => None,
        }
        .ok_or(CampaignError::TemplateNotFound)?;

        if campaign.contact_list_ids.is_empty() {
            return Err(CampaignError::NoContactLists);
        }

        let mut lists = Vec::with_capacity(campaign.contact_list_ids.len());
        for list_id in &campaign.contact_list_ids {
            let list = self
                .store
                .contact_list(list_id)
                .await
                .ok_or_else(|| CampaignError::ContactListNotFound(list_id.clone()))?;
            lists.push(list);
        }

        if template.content.trim().is_empty() {
            return Err(CampaignError::BlankTemplate);
        }

        if smtp.host.trim().is_empty() {
            return Err(CampaignError::MissingSmtpHost);
        }

        if smtp.use_auth && (smtp.username.is_empty() || smtp.password.is_empty()) {
            return Err(CampaignError::MissingSmtpCredentials);
        }

        if let Some(empty) = lists.iter().find(|list| list.contacts.is_empty()) {
            return Err(CampaignError::EmptyContactList(empty.name.clone()));
        }

        // Contacts on several lists are sent to once per list
        let recipients = lists.into_iter().flat_map(|list| list.contacts).collect();

        Ok(RunPlan {
            campaign,
            template,
            recipients,
        })
    }
}

fn persistence_failure(id: &str, e: mailcast_common::Error) -> CampaignError {
    error!(campaign_id = %id, error = %e, "Failed to persist campaign progress");
    CampaignError::Persistence(e)
}
