//! Campaign and run error table access

use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;
use tracing::warn;

use crate::models::{Campaign, CampaignPatch, CampaignStatus, RecipientError};

#[derive(Debug, FromRow)]
struct CampaignRow {
    id: String,
    name: String,
    subject: String,
    template_id: Option<String>,
    template_name: Option<String>,
    contact_list_id: Option<String>,
    contact_list_ids: Option<Json<Vec<String>>>,
    status: String,
    sent_count: Option<i32>,
    total_count: Option<i32>,
    create_date: Option<String>,
}

#[derive(Debug, FromRow)]
struct ErrorRow {
    campaign_id: String,
    email: String,
    error: String,
}

impl CampaignRow {
    fn into_campaign(self, errors: Option<Vec<RecipientError>>) -> Campaign {
        let status = self.status.parse().unwrap_or_else(|_| {
            warn!(campaign_id = %self.id, status = %self.status, "Unknown campaign status, treating as draft");
            CampaignStatus::Draft
        });

        Campaign {
            contact_list_ids: Campaign::normalize_list_ids(
                self.contact_list_ids.map(|ids| ids.0),
                self.contact_list_id,
            ),
            id: self.id,
            name: self.name,
            subject: self.subject,
            template_id: self.template_id,
            template_name: self.template_name,
            status,
            sent_count: count_from_db(self.sent_count),
            total_count: count_from_db(self.total_count),
            create_date: self.create_date.unwrap_or_default(),
            error: errors.and_then(|e| Campaign::encode_errors(&e)),
        }
    }
}

fn count_from_db(value: Option<i32>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn count_to_db(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// List campaigns with the errors of their latest run
pub async fn list(conn: &mut PgConnection) -> Result<Vec<Campaign>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CampaignRow>(
        r#"
        SELECT id, name, subject, template_id, template_name, contact_list_id,
               contact_list_ids, status, sent_count, total_count, create_date
        FROM campaigns
        ORDER BY created_at, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let error_rows = sqlx::query_as::<_, ErrorRow>(
        "SELECT campaign_id, email, error FROM errors ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut errors: HashMap<String, Vec<RecipientError>> = HashMap::new();
    for row in error_rows {
        errors.entry(row.campaign_id).or_default().push(RecipientError {
            email: row.email,
            error: row.error,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let run_errors = errors.remove(&row.id);
            row.into_campaign(run_errors)
        })
        .collect())
}

/// Insert a campaign with its recorded errors
pub async fn insert(conn: &mut PgConnection, campaign: &Campaign) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO campaigns (
            id, name, subject, template_id, template_name, contact_list_ids,
            status, sent_count, total_count, create_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&campaign.id)
    .bind(&campaign.name)
    .bind(&campaign.subject)
    .bind(&campaign.template_id)
    .bind(&campaign.template_name)
    .bind(Json(&campaign.contact_list_ids))
    .bind(campaign.status.to_string())
    .bind(count_to_db(campaign.sent_count))
    .bind(count_to_db(campaign.total_count))
    .bind(&campaign.create_date)
    .execute(&mut *conn)
    .await?;

    replace_errors(conn, &campaign.id, &campaign.errors()).await
}

/// Apply a partial update, returning whether the campaign existed
pub async fn update(
    conn: &mut PgConnection,
    id: &str,
    patch: &CampaignPatch,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns SET
            name = COALESCE($2, name),
            subject = COALESCE($3, subject),
            template_id = COALESCE($4, template_id),
            contact_list_ids = COALESCE($5, contact_list_ids),
            contact_list_id = CASE WHEN $5 IS NULL THEN contact_list_id ELSE NULL END,
            status = COALESCE($6, status),
            sent_count = COALESCE($7, sent_count),
            total_count = COALESCE($8, total_count)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&patch.name)
    .bind(&patch.subject)
    .bind(&patch.template_id)
    .bind(patch.contact_list_ids.as_ref().map(Json))
    .bind(patch.status.map(|s| s.to_string()))
    .bind(patch.sent_count.map(count_to_db))
    .bind(patch.total_count.map(count_to_db))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    if let Some(error) = &patch.error {
        let entries = error.as_deref().map(Campaign::decode_errors).unwrap_or_default();
        replace_errors(conn, id, &entries).await?;
    }

    Ok(true)
}

/// Delete a campaign; its errors cascade
pub async fn delete(conn: &mut PgConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Replace the stored errors of a campaign's latest run
async fn replace_errors(
    conn: &mut PgConnection,
    campaign_id: &str,
    errors: &[RecipientError],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM errors WHERE campaign_id = $1")
        .bind(campaign_id)
        .execute(&mut *conn)
        .await?;

    for entry in errors {
        sqlx::query("INSERT INTO errors (campaign_id, email, error) VALUES ($1, $2, $3)")
            .bind(campaign_id)
            .bind(&entry.email)
            .bind(&entry.error)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
