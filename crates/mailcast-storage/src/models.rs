//! Database and wire models
//!
//! JSON field names are camelCase so documents round-trip with the web UI.

use mailcast_common::types::{CampaignId, ContactId, ContactListId, TemplateId};
use mailcast_common::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// HTML email template
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// A single recipient
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct EmailContact {
    pub id: ContactId,
    pub name: String,
    pub email: String,
}

/// Named, ordered collection of recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactList {
    pub id: ContactListId,
    pub name: String,
    #[serde(default)]
    pub contacts: Vec<EmailContact>,
}

/// Campaign status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Sending,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl CampaignStatus {
    /// Outcome of a run given its success and failure counts
    pub fn from_outcome(sent: u32, failed: usize) -> Self {
        match (failed, sent) {
            (0, _) => CampaignStatus::Completed,
            (_, 0) => CampaignStatus::Failed,
            _ => CampaignStatus::CompletedWithErrors,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::CompletedWithErrors => write!(f, "completed-with-errors"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "sending" => Ok(CampaignStatus::Sending),
            "completed" => Ok(CampaignStatus::Completed),
            "completed-with-errors" => Ok(CampaignStatus::CompletedWithErrors),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Delivery failure for one recipient of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientError {
    pub email: String,
    pub error: String,
}

/// Campaign model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CampaignDocument")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub subject: String,
    pub template_id: Option<TemplateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    pub contact_list_ids: Vec<ContactListId>,
    pub status: CampaignStatus,
    pub sent_count: u32,
    pub total_count: u32,
    pub create_date: String,
    /// JSON array of [`RecipientError`] from the most recent run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Campaign as found in stored or client documents, before normalisation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CampaignDocument {
    id: CampaignId,
    name: String,
    subject: String,
    #[serde(default)]
    template_id: Option<TemplateId>,
    #[serde(default)]
    template_name: Option<String>,
    #[serde(default)]
    contact_list_ids: Option<Vec<ContactListId>>,
    #[serde(default)]
    contact_list_id: Option<ContactListId>,
    #[serde(default)]
    status: CampaignStatus,
    #[serde(default)]
    sent_count: Option<u32>,
    #[serde(default)]
    total_count: Option<u32>,
    #[serde(default)]
    create_date: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl From<CampaignDocument> for Campaign {
    fn from(doc: CampaignDocument) -> Self {
        let error = match doc.error {
            Some(serde_json::Value::String(text)) if !text.is_empty() => Some(text),
            Some(serde_json::Value::Array(items)) if !items.is_empty() => {
                Some(serde_json::Value::Array(items).to_string())
            }
            _ => None,
        };

        Self {
            id: doc.id,
            name: doc.name,
            subject: doc.subject,
            template_id: doc.template_id.filter(|id| !id.is_empty()),
            template_name: doc.template_name,
            contact_list_ids: Campaign::normalize_list_ids(doc.contact_list_ids, doc.contact_list_id),
            status: doc.status,
            sent_count: doc.sent_count.unwrap_or(0),
            total_count: doc.total_count.unwrap_or(0),
            create_date: doc.create_date.unwrap_or_default(),
            error,
        }
    }
}

impl Campaign {
    /// Map the legacy single `contactListId` shape onto `contactListIds`.
    pub fn normalize_list_ids(
        ids: Option<Vec<ContactListId>>,
        legacy: Option<ContactListId>,
    ) -> Vec<ContactListId> {
        match ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => legacy
                .filter(|id| !id.is_empty())
                .map(|id| vec![id])
                .unwrap_or_default(),
        }
    }

    /// Serialise run errors; `None` when the run had no failures
    pub fn encode_errors(errors: &[RecipientError]) -> Option<String> {
        if errors.is_empty() {
            return None;
        }
        serde_json::to_string(errors).ok()
    }

    /// Decode a stored error field.
    ///
    /// Early versions stored a single plain-text message; that shape comes
    /// back as one entry with an empty email.
    pub fn decode_errors(raw: &str) -> Vec<RecipientError> {
        match serde_json::from_str::<Vec<RecipientError>>(raw) {
            Ok(entries) => entries,
            Err(_) if raw.trim().is_empty() => Vec::new(),
            Err(_) => vec![RecipientError {
                email: String::new(),
                error: raw.to_string(),
            }],
        }
    }

    /// Errors recorded by the most recent run
    pub fn errors(&self) -> Vec<RecipientError> {
        self.error.as_deref().map(Self::decode_errors).unwrap_or_default()
    }

    /// Merge a partial update into this record
    pub fn apply(&mut self, patch: &CampaignPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(subject) = &patch.subject {
            self.subject = subject.clone();
        }
        if let Some(template_id) = &patch.template_id {
            self.template_id = Some(template_id.clone());
        }
        if let Some(ids) = &patch.contact_list_ids {
            self.contact_list_ids = ids.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(sent) = patch.sent_count {
            self.sent_count = sent;
        }
        if let Some(total) = patch.total_count {
            self.total_count = total;
        }
        if let Some(error) = &patch.error {
            self.error = error.clone();
        }
    }
}

/// Partial campaign update
///
/// `error: Some(None)` clears the stored errors, `None` leaves them as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_list_ids: Option<Vec<ContactListId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Option<String>>,
}

impl CampaignPatch {
    /// Patch that only sets the status
    pub fn status(status: CampaignStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Patch that only sets the sent counter
    pub fn sent_count(sent: u32) -> Self {
        Self {
            sent_count: Some(sent),
            ..Default::default()
        }
    }

    /// Drop the fields owned by the send engine
    pub fn without_run_state(mut self) -> Self {
        self.status = None;
        self.sent_count = None;
        self.error = None;
        self
    }
}

/// Distinguish an explicit `null` from an absent field
fn deserialize_present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Outbound SMTP relay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SmtpDocument")]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Implicit TLS when set, STARTTLS otherwise
    #[serde(rename = "useSSL")]
    pub use_ssl: bool,
    pub use_auth: bool,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: String::new(),
            from_name: String::new(),
            use_ssl: false,
            use_auth: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmtpDocument {
    #[serde(default)]
    host: String,
    #[serde(default = "default_smtp_port")]
    port: u16,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    from_email: String,
    #[serde(default)]
    from_name: String,
    #[serde(default, rename = "useSSL")]
    use_ssl: Option<bool>,
    #[serde(default)]
    use_auth: Option<bool>,
}

fn default_smtp_port() -> u16 {
    587
}

impl From<SmtpDocument> for SmtpSettings {
    fn from(doc: SmtpDocument) -> Self {
        Self {
            use_ssl: doc.use_ssl.unwrap_or(doc.port == 465),
            use_auth: doc.use_auth.unwrap_or(true),
            host: doc.host,
            port: doc.port,
            username: doc.username,
            password: doc.password,
            from_email: doc.from_email,
            from_name: doc.from_name,
        }
    }
}

/// Everything the UI edits: templates, lists, campaigns and the relay config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBundle {
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub contact_lists: Vec<ContactList>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub smtp_config: SmtpSettings,
}

impl SettingsBundle {
    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn contact_list(&self, id: &str) -> Option<&ContactList> {
        self.contact_lists.iter().find(|l| l.id == id)
    }

    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }

    /// Campaigns may only point at templates that exist
    pub fn require_template(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) if self.template(id).is_none() => Err(Error::Validation(format!(
                "Selected template not found: {}",
                id
            ))),
            _ => Ok(()),
        }
    }

    /// Apply one mutation in place
    pub fn apply(&mut self, action: &SettingsAction) -> Result<()> {
        match action {
            SettingsAction::AddTemplate(template) => {
                if self.template(&template.id).is_some() {
                    return Err(Error::Conflict(format!("template {} already exists", template.id)));
                }
                self.templates.push(template.clone());
            }
            SettingsAction::UpdateTemplate(template) => {
                let slot = self
                    .templates
                    .iter_mut()
                    .find(|t| t.id == template.id)
                    .ok_or_else(|| Error::NotFound(format!("template {}", template.id)))?;
                *slot = template.clone();
            }
            SettingsAction::DeleteTemplate(id) => {
                let before = self.templates.len();
                self.templates.retain(|t| &t.id != id);
                if self.templates.len() == before {
                    return Err(Error::NotFound(format!("template {}", id)));
                }
                for campaign in self.campaigns.iter_mut() {
                    if campaign.template_id.as_deref() == Some(id.as_str()) {
                        campaign.template_id = None;
                    }
                }
            }
            SettingsAction::AddContactList(list) => {
                if self.contact_list(&list.id).is_some() {
                    return Err(Error::Conflict(format!("contact list {} already exists", list.id)));
                }
                self.contact_lists.push(list.clone());
            }
            SettingsAction::UpdateContactList(list) => {
                let slot = self
                    .contact_lists
                    .iter_mut()
                    .find(|l| l.id == list.id)
                    .ok_or_else(|| Error::NotFound(format!("contact list {}", list.id)))?;
                *slot = list.clone();
            }
            SettingsAction::DeleteContactList(id) => {
                let before = self.contact_lists.len();
                self.contact_lists.retain(|l| &l.id != id);
                if self.contact_lists.len() == before {
                    return Err(Error::NotFound(format!("contact list {}", id)));
                }
            }
            SettingsAction::AddCampaign(campaign) => {
                if self.campaign(&campaign.id).is_some() {
                    return Err(Error::Conflict(format!("campaign {} already exists", campaign.id)));
                }
                self.require_template(campaign.template_id.as_deref())?;
                self.campaigns.push(campaign.clone());
            }
            SettingsAction::UpdateCampaign { id, patch } => {
                self.require_template(patch.template_id.as_deref())?;
                let slot = self
                    .campaigns
                    .iter_mut()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| Error::NotFound(format!("campaign {}", id)))?;
                slot.apply(patch);
            }
            SettingsAction::DeleteCampaign(id) => {
                let before = self.campaigns.len();
                self.campaigns.retain(|c| &c.id != id);
                if self.campaigns.len() == before {
                    return Err(Error::NotFound(format!("campaign {}", id)));
                }
            }
            SettingsAction::UpdateSmtpConfig(settings) => {
                self.smtp_config = settings.clone();
            }
        }
        Ok(())
    }
}

/// Action tag of a settings delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    AddTemplate,
    UpdateTemplate,
    DeleteTemplate,
    AddContactList,
    UpdateContactList,
    DeleteContactList,
    AddCampaign,
    UpdateCampaign,
    DeleteCampaign,
    UpdateSmtpConfig,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ActionKind::AddTemplate => "ADD_TEMPLATE",
            ActionKind::UpdateTemplate => "UPDATE_TEMPLATE",
            ActionKind::DeleteTemplate => "DELETE_TEMPLATE",
            ActionKind::AddContactList => "ADD_CONTACT_LIST",
            ActionKind::UpdateContactList => "UPDATE_CONTACT_LIST",
            ActionKind::DeleteContactList => "DELETE_CONTACT_LIST",
            ActionKind::AddCampaign => "ADD_CAMPAIGN",
            ActionKind::UpdateCampaign => "UPDATE_CAMPAIGN",
            ActionKind::DeleteCampaign => "DELETE_CAMPAIGN",
            ActionKind::UpdateSmtpConfig => "UPDATE_SMTP_CONFIG",
        };
        f.write_str(tag)
    }
}

/// A single typed mutation of the settings bundle
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    AddTemplate(Template),
    UpdateTemplate(Template),
    DeleteTemplate(TemplateId),
    AddContactList(ContactList),
    UpdateContactList(ContactList),
    DeleteContactList(ContactListId),
    AddCampaign(Campaign),
    UpdateCampaign { id: CampaignId, patch: CampaignPatch },
    DeleteCampaign(CampaignId),
    UpdateSmtpConfig(SmtpSettings),
}

impl SettingsAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            SettingsAction::AddTemplate(_) => ActionKind::AddTemplate,
            SettingsAction::UpdateTemplate(_) => ActionKind::UpdateTemplate,
            SettingsAction::DeleteTemplate(_) => ActionKind::DeleteTemplate,
            SettingsAction::AddContactList(_) => ActionKind::AddContactList,
            SettingsAction::UpdateContactList(_) => ActionKind::UpdateContactList,
            SettingsAction::DeleteContactList(_) => ActionKind::DeleteContactList,
            SettingsAction::AddCampaign(_) => ActionKind::AddCampaign,
            SettingsAction::UpdateCampaign { .. } => ActionKind::UpdateCampaign,
            SettingsAction::DeleteCampaign(_) => ActionKind::DeleteCampaign,
            SettingsAction::UpdateSmtpConfig(_) => ActionKind::UpdateSmtpConfig,
        }
    }
}

/// Action-tagged delta as posted by the UI: `{ "type", "data", "smtpConfig"? }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDelta {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_config: Option<SmtpSettings>,
}

/// Delete payloads carry either a bare id or an object with an `id`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdRef {
    Bare(String),
    Object { id: String },
}

impl IdRef {
    fn into_id(self) -> String {
        match self {
            IdRef::Bare(id) | IdRef::Object { id } => id,
        }
    }
}

impl SettingsDelta {
    /// Decode the payload into typed actions, the optional SMTP update last
    pub fn into_actions(self) -> Result<Vec<SettingsAction>> {
        let kind = self.kind;
        let invalid =
            move |e: serde_json::Error| Error::Validation(format!("Invalid {} payload: {}", kind, e));
        let data = self.data;

        let action = match kind {
            ActionKind::AddTemplate => {
                SettingsAction::AddTemplate(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionKind::UpdateTemplate => {
                SettingsAction::UpdateTemplate(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionKind::DeleteTemplate => SettingsAction::DeleteTemplate(
                serde_json::from_value::<IdRef>(data).map_err(invalid)?.into_id(),
            ),
            ActionKind::AddContactList => {
                SettingsAction::AddContactList(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionKind::UpdateContactList => {
                SettingsAction::UpdateContactList(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionKind::DeleteContactList => SettingsAction::DeleteContactList(
                serde_json::from_value::<IdRef>(data).map_err(invalid)?.into_id(),
            ),
            ActionKind::AddCampaign => {
                SettingsAction::AddCampaign(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionKind::UpdateCampaign => {
                let id = data
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::Validation("UPDATE_CAMPAIGN payload requires an id".to_string())
                    })?;
                let patch = serde_json::from_value(data).map_err(invalid)?;
                SettingsAction::UpdateCampaign { id, patch }
            }
            ActionKind::DeleteCampaign => SettingsAction::DeleteCampaign(
                serde_json::from_value::<IdRef>(data).map_err(invalid)?.into_id(),
            ),
            ActionKind::UpdateSmtpConfig => {
                SettingsAction::UpdateSmtpConfig(serde_json::from_value(data).map_err(invalid)?)
            }
        };

        let mut actions = vec![action];
        if let Some(smtp) = self.smtp_config {
            actions.push(SettingsAction::UpdateSmtpConfig(smtp));
        }
        Ok(actions)
    }
}
