//! Database pool creation and schema bootstrap.
//!
//! Targets SQLite via `sqlx` (see SPEC_FULL.md Open Question OQ-1 for why
//! Postgres is deferred to a follow-up feature rather than built in now).

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbError;

/// Database pool configuration, mirroring `casparian_db::DbConfig`'s
/// builder style.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
        }
    }

    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Create a pool and apply WAL + schema bootstrap.
pub async fn create_pool(config: DbConfig) -> Result<SqlitePool, DbError> {
    let connect_options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_options)
        .await?;

    apply_sqlite_optimizations(&pool).await?;
    run_migrations(&pool).await?;

    info!(url = %config.url, "Connected to TutorDex database");
    Ok(pool)
}

async fn apply_sqlite_optimizations(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;
    Ok(())
}

/// Create the three core tables if they don't already exist. A real
/// deployment would use `sqlx::migrate!`; inline DDL keeps this workspace
/// free of a migrations directory while the schema is still small and
/// matches how `casparian_sentinel`'s tests seed `cf_processing_queue`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            channel_username TEXT,
            channel_title TEXT,
            date TEXT NOT NULL,
            raw_text TEXT NOT NULL,
            is_forwarded INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            ingested_at TEXT NOT NULL,
            UNIQUE(channel_id, message_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS extraction_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_id INTEGER NOT NULL,
            pipeline_version TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            claimed_at TEXT,
            claimed_by TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error_kind TEXT,
            last_error_msg TEXT,
            meta TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            UNIQUE(raw_id, pipeline_version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_extraction_jobs_status_id
        ON extraction_jobs (status, id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            channel_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            parsed_json TEXT NOT NULL,
            signals_json TEXT NOT NULL,
            postal_lat REAL,
            postal_lon REAL,
            status TEXT NOT NULL DEFAULT 'open',
            freshness_tier TEXT NOT NULL DEFAULT 'green',
            published_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            duplicate_group_id TEXT,
            is_primary_in_group INTEGER NOT NULL DEFAULT 1,
            duplicate_confidence_score REAL,
            PRIMARY KEY (channel_id, message_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_bootstraps_schema() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<String> = tables.into_iter().map(|(n,)| n).collect();
        assert!(names.contains(&"raw_messages".to_string()));
        assert!(names.contains(&"extraction_jobs".to_string()));
        assert!(names.contains(&"assignments".to_string()));
    }
}
