//! Postgres pool backing the settings repository

use mailcast_common::config::DatabaseConfig;
use mailcast_common::{Error, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Schema for templates, contact lists, campaigns, their errors and the
/// relay row
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Shared handle to the settings database
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool described by `[database]`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = postgres_url(config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| Error::Database(format!("Cannot reach settings database: {}", e)))?;

        info!(
            max_connections = config.max_connections,
            "Settings database connected"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bring the schema up to date.
    ///
    /// Steps already recorded in `_sqlx_migrations` are skipped.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Schema migration failed: {}", e)))?;

        info!(steps = MIGRATOR.migrations.len(), "Settings schema up to date");
        Ok(())
    }

    /// Round-trip a trivial query and report how long it took
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Settings database unreachable: {}", e)))?;

        let elapsed = started.elapsed();
        debug!(latency_ms = elapsed.as_millis() as u64, "Settings database ping");
        Ok(elapsed)
    }
}

/// Only Postgres is served from SQL; `memory` never opens a pool
fn postgres_url(config: &DatabaseConfig) -> Result<&str> {
    if config.backend != "postgres" {
        return Err(Error::Config(format!(
            "Database backend {} does not use a connection pool",
            config.backend
        )));
    }

    config
        .url
        .as_deref()
        .ok_or_else(|| Error::Config("database.url is required for postgres".to_string()))
}
