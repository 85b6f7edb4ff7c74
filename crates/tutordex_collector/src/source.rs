//! Abstraction over the external Telegram client library. The pipeline
//! never talks to Telegram's MTProto/Bot transport directly, only through
//! this trait, so tests can supply a fake and the concrete client stays a
//! swappable collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::CollectorError;

/// One inbound Telegram post, already shaped to what C1 needs — the source
/// implementation is responsible for mapping the client library's wire
/// representation down to this.
#[derive(Debug, Clone)]
pub struct RawUpdate {
    pub channel_id: i64,
    pub message_id: i64,
    pub channel_username: Option<String>,
    pub channel_title: Option<String>,
    pub date: DateTime<Utc>,
    pub raw_text: String,
    pub is_forwarded: bool,
    pub is_deleted: bool,
}

#[async_trait]
pub trait TelegramSource: Send + Sync {
    /// Live subscription over the configured channel set.
    async fn stream(&self) -> Result<BoxStream<'static, Result<RawUpdate, CollectorError>>, CollectorError>;

    /// Historical page for one channel within `[since, until]`.
    async fn history(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<BoxStream<'static, Result<RawUpdate, CollectorError>>, CollectorError>;
}
