//! Relay configuration row access

use sqlx::{FromRow, PgConnection};

use crate::models::SmtpSettings;

#[derive(Debug, FromRow)]
struct SmtpRow {
    host: String,
    port: i32,
    username: String,
    password: String,
    from_email: String,
    from_name: String,
    use_ssl: bool,
    use_auth: bool,
}

/// Fetch the stored relay settings, if seeded
pub async fn get(conn: &mut PgConnection) -> Result<Option<SmtpSettings>, sqlx::Error> {
    let row = sqlx::query_as::<_, SmtpRow>(
        r#"
        SELECT host, port, username, password, from_email, from_name, use_ssl, use_auth
        FROM smtp_config
        WHERE id = 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| SmtpSettings {
        host: row.host,
        port: u16::try_from(row.port).unwrap_or(587),
        username: row.username,
        password: row.password,
        from_email: row.from_email,
        from_name: row.from_name,
        use_ssl: row.use_ssl,
        use_auth: row.use_auth,
    }))
}

/// Insert or overwrite the relay settings
pub async fn upsert(conn: &mut PgConnection, settings: &SmtpSettings) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO smtp_config (
            id, host, port, username, password, from_email, from_name, use_ssl, use_auth
        )
        VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            host = EXCLUDED.host,
            port = EXCLUDED.port,
            username = EXCLUDED.username,
            password = EXCLUDED.password,
            from_email = EXCLUDED.from_email,
            from_name = EXCLUDED.from_name,
            use_ssl = EXCLUDED.use_ssl,
            use_auth = EXCLUDED.use_auth
        "#,
    )
    .bind(&settings.host)
    .bind(i32::from(settings.port))
    .bind(&settings.username)
    .bind(&settings.password)
    .bind(&settings.from_email)
    .bind(&settings.from_name)
    .bind(settings.use_ssl)
    .bind(settings.use_auth)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
