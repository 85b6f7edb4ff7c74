//! Raw message store adapter.
//!
//! Telegram can re-deliver edited messages under the same
//! `(channel_id, message_id)`; the upsert keeps the newer `date` and ignores
//! stale replays, so an edit never regresses the stored text to an older
//! revision.

use chrono::Utc;
use sqlx::SqlitePool;
use tutordex_protocol::{ChannelInfo, RawMessage};

use crate::error::DbError;
use crate::util::parse_rfc3339;

#[derive(Clone)]
pub struct RawStoreAdapter {
    pool: SqlitePool,
}

impl RawStoreAdapter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a raw message, or update it in place if a newer revision of
    /// the same `(channel_id, message_id)` has since arrived. Returns the
    /// datastore-assigned row id either way.
    pub async fn upsert_raw(&self, msg: &RawMessage) -> Result<i64, DbError> {
        let date = msg.date.to_rfc3339();
        let ingested_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO raw_messages
                (channel_id, message_id, channel_username, channel_title, date,
                 raw_text, is_forwarded, is_deleted, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(channel_id, message_id) DO UPDATE SET
                raw_text = excluded.raw_text,
                date = excluded.date,
                is_forwarded = excluded.is_forwarded,
                is_deleted = excluded.is_deleted
            WHERE excluded.date >= raw_messages.date
            "#,
        )
        .bind(msg.channel_id)
        .bind(msg.message_id)
        .bind(&msg.channel_username)
        .bind(&msg.channel_title)
        .bind(&date)
        .bind(&msg.raw_text)
        .bind(msg.is_forwarded)
        .bind(msg.is_deleted)
        .bind(&ingested_at)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar(
            "SELECT id FROM raw_messages WHERE channel_id = ? AND message_id = ?",
        )
        .bind(msg.channel_id)
        .bind(msg.message_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Flip `is_deleted` for a message the upstream has since deleted,
    /// without discarding the text already captured. Deletions are
    /// tombstoned, never removed.
    pub async fn mark_deleted(&self, channel_id: i64, message_id: i64) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE raw_messages SET is_deleted = 1 WHERE channel_id = ? AND message_id = ?",
        )
        .bind(channel_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_raw(&self, raw_id: i64) -> Result<Option<RawMessage>, DbError> {
        let row = sqlx::query_as::<_, RawRow>("SELECT * FROM raw_messages WHERE id = ?")
            .bind(raw_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(RawRow::into_message))
    }

    pub async fn get_channel(&self, channel_id: i64) -> Result<Option<ChannelInfo>, DbError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT channel_id, channel_username, channel_title
            FROM raw_messages WHERE channel_id = ? LIMIT 1
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ChannelInfo {
            channel_id: r.channel_id,
            username: r.channel_username,
            title: r.channel_title,
            link: None,
        }))
    }
}

#[derive(sqlx::FromRow)]
struct RawRow {
    id: i64,
    channel_id: i64,
    message_id: i64,
    channel_username: Option<String>,
    channel_title: Option<String>,
    date: String,
    raw_text: String,
    is_forwarded: bool,
    is_deleted: bool,
    ingested_at: String,
}

impl RawRow {
    fn into_message(self) -> RawMessage {
        RawMessage {
            id: self.id,
            channel_id: self.channel_id,
            message_id: self.message_id,
            channel_username: self.channel_username,
            channel_title: self.channel_title,
            date: parse_rfc3339(&self.date),
            raw_text: self.raw_text,
            is_forwarded: self.is_forwarded,
            is_deleted: self.is_deleted,
            ingested_at: parse_rfc3339(&self.ingested_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    channel_id: i64,
    channel_username: Option<String>,
    channel_title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, DbConfig};
    use chrono::{Duration, TimeZone};

    fn sample(date: chrono::DateTime<Utc>, text: &str) -> RawMessage {
        RawMessage {
            id: 0,
            channel_id: 100,
            message_id: 1,
            channel_username: Some("tutoragency1".to_string()),
            channel_title: Some("Tutor Agency".to_string()),
            date,
            raw_text: text.to_string(),
            is_forwarded: false,
            is_deleted: false,
            ingested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_channel_and_message_id() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let store = RawStoreAdapter::new(pool);
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();

        let id1 = store.upsert_raw(&sample(now, "first")).await.unwrap();
        let id2 = store.upsert_raw(&sample(now, "first")).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn edit_never_regresses_to_an_older_revision() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let store = RawStoreAdapter::new(pool);
        let newer = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let older = newer - Duration::hours(1);

        let id = store.upsert_raw(&sample(newer, "edited")).await.unwrap();
        store.upsert_raw(&sample(older, "stale replay")).await.unwrap();

        let stored = store.get_raw(id).await.unwrap().unwrap();
        assert_eq!(stored.raw_text, "edited");
    }

    #[tokio::test]
    async fn mark_deleted_keeps_the_text() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let store = RawStoreAdapter::new(pool);
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let id = store.upsert_raw(&sample(now, "original text")).await.unwrap();

        store.mark_deleted(100, 1).await.unwrap();

        let stored = store.get_raw(id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.raw_text, "original text");
    }
}
