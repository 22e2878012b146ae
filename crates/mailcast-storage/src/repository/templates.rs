//! Template table access

use sqlx::PgConnection;

use crate::models::Template;

/// List templates in creation order
pub async fn list(conn: &mut PgConnection) -> Result<Vec<Template>, sqlx::Error> {
    sqlx::query_as::<_, Template>("SELECT id, name, content FROM templates ORDER BY created_at, id")
        .fetch_all(&mut *conn)
        .await
}

/// Insert a template
pub async fn insert(conn: &mut PgConnection, template: &Template) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO templates (id, name, content) VALUES ($1, $2, $3)")
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.content)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Update a template, returning whether it existed
pub async fn update(conn: &mut PgConnection, template: &Template) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE templates SET name = $2, content = $3 WHERE id = $1")
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.content)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a template; campaigns referencing it keep a NULL template id
pub async fn delete(conn: &mut PgConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM templates WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
