//! Settings repository

use crate::db::DatabasePool;
use crate::models::{SettingsAction, SettingsBundle};
use crate::repository::{campaigns, contact_lists, db_err, smtp_config, templates};
use async_trait::async_trait;
use mailcast_common::{Error, Result};
use sqlx::PgConnection;
use tracing::debug;

/// Settings repository trait
///
/// Every call is atomic: either all of it is persisted or none of it.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Read the full settings document
    async fn load(&self) -> Result<SettingsBundle>;

    /// Overwrite everything with the given document
    async fn replace(&self, bundle: &SettingsBundle) -> Result<()>;

    /// Persist a batch of mutations
    async fn apply(&self, actions: &[SettingsAction]) -> Result<()>;
}

/// Database settings repository
pub struct DbSettingsRepository {
    pool: DatabasePool,
}

impl DbSettingsRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for DbSettingsRepository {
    async fn load(&self) -> Result<SettingsBundle> {
        let mut conn = self.pool.pool().acquire().await.map_err(db_err)?;

        Ok(SettingsBundle {
            templates: templates::list(&mut conn).await.map_err(db_err)?,
            contact_lists: contact_lists::list(&mut conn).await.map_err(db_err)?,
            campaigns: campaigns::list(&mut conn).await.map_err(db_err)?,
            smtp_config: smtp_config::get(&mut conn)
                .await
                .map_err(db_err)?
                .unwrap_or_default(),
        })
    }

    async fn replace(&self, bundle: &SettingsBundle) -> Result<()> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        for table in ["errors", "campaigns", "contacts", "contact_lists", "templates"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        for template in &bundle.templates {
            templates::insert(&mut tx, template).await.map_err(write_err)?;
        }
        for list in &bundle.contact_lists {
            contact_lists::insert(&mut tx, list).await.map_err(write_err)?;
        }
        for campaign in &bundle.campaigns {
            campaigns::insert(&mut tx, campaign).await.map_err(write_err)?;
        }
        smtp_config::upsert(&mut tx, &bundle.smtp_config)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        debug!(
            templates = bundle.templates.len(),
            contact_lists = bundle.contact_lists.len(),
            campaigns = bundle.campaigns.len(),
            "Settings replaced"
        );
        Ok(())
    }

    async fn apply(&self, actions: &[SettingsAction]) -> Result<()> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        for action in actions {
            apply_action(&mut tx, action).await?;
        }

        tx.commit().await.map_err(db_err)?;

        debug!(count = actions.len(), "Settings actions persisted");
        Ok(())
    }
}

async fn apply_action(conn: &mut PgConnection, action: &SettingsAction) -> Result<()> {
    let found = match action {
        SettingsAction::AddTemplate(template) => {
            templates::insert(conn, template).await.map_err(write_err)?;
            true
        }
        SettingsAction::UpdateTemplate(template) => {
            templates::update(conn, template).await.map_err(db_err)?
        }
        SettingsAction::DeleteTemplate(id) => templates::delete(conn, id).await.map_err(db_err)?,
        SettingsAction::AddContactList(list) => {
            contact_lists::insert(conn, list).await.map_err(write_err)?;
            true
        }
        SettingsAction::UpdateContactList(list) => {
            contact_lists::update(conn, list).await.map_err(write_err)?
        }
        SettingsAction::DeleteContactList(id) => {
            contact_lists::delete(conn, id).await.map_err(db_err)?
        }
        SettingsAction::AddCampaign(campaign) => {
            campaigns::insert(conn, campaign).await.map_err(write_err)?;
            true
        }
        SettingsAction::UpdateCampaign { id, patch } => {
            campaigns::update(conn, id, patch).await.map_err(write_err)?
        }
        SettingsAction::DeleteCampaign(id) => campaigns::delete(conn, id).await.map_err(db_err)?,
        SettingsAction::UpdateSmtpConfig(settings) => {
            smtp_config::upsert(conn, settings).await.map_err(db_err)?;
            true
        }
    };

    if found {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{} target does not exist", action.kind())))
    }
}

/// Map write failures, surfacing key collisions as conflicts
fn write_err(e: sqlx::Error) -> Error {
    let unique_violation = e
        .as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == "23505");

    if unique_violation {
        Error::Conflict(e.to_string())
    } else {
        db_err(e)
    }
}
