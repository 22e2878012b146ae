//! Contact list and contact table access

use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;

use crate::models::{ContactList, EmailContact};

#[derive(Debug, FromRow)]
struct ContactRow {
    contact_list_id: String,
    id: String,
    name: String,
    email: String,
}

/// List contact lists with their contacts in stored order
pub async fn list(conn: &mut PgConnection) -> Result<Vec<ContactList>, sqlx::Error> {
    let lists: Vec<(String, String)> =
        sqlx::query_as("SELECT id, name FROM contact_lists ORDER BY created_at, id")
            .fetch_all(&mut *conn)
            .await?;

    let rows = sqlx::query_as::<_, ContactRow>(
        r#"
        SELECT contact_list_id, id, name, email
        FROM contacts
        ORDER BY contact_list_id, position
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut contacts: HashMap<String, Vec<EmailContact>> = HashMap::new();
    for row in rows {
        contacts.entry(row.contact_list_id).or_default().push(EmailContact {
            id: row.id,
            name: row.name,
            email: row.email,
        });
    }

    Ok(lists
        .into_iter()
        .map(|(id, name)| ContactList {
            contacts: contacts.remove(&id).unwrap_or_default(),
            id,
            name,
        })
        .collect())
}

/// Insert a list and its contacts
pub async fn insert(conn: &mut PgConnection, list: &ContactList) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO contact_lists (id, name) VALUES ($1, $2)")
        .bind(&list.id)
        .bind(&list.name)
        .execute(&mut *conn)
        .await?;

    insert_contacts(conn, list).await
}

/// Replace a list's name and contacts, returning whether it existed
pub async fn update(conn: &mut PgConnection, list: &ContactList) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE contact_lists SET name = $2 WHERE id = $1")
        .bind(&list.id)
        .bind(&list.name)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM contacts WHERE contact_list_id = $1")
        .bind(&list.id)
        .execute(&mut *conn)
        .await?;

    insert_contacts(conn, list).await?;
    Ok(true)
}

/// Delete a list; its contacts cascade
pub async fn delete(conn: &mut PgConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contact_lists WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn insert_contacts(conn: &mut PgConnection, list: &ContactList) -> Result<(), sqlx::Error> {
    for (position, contact) in list.contacts.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO contacts (id, contact_list_id, position, name, email)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&contact.id)
        .bind(&list.id)
        .bind(i32::try_from(position).unwrap_or(i32::MAX))
        .bind(&contact.name)
        .bind(&contact.email)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
