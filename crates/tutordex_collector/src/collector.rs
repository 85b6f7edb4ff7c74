//! `Collector::tail` and `Collector::backfill`, both funneling
//! into `ingest_one` which drives C1 (raw store) then C2 (queue enqueue).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::time::sleep;
use tutordex_db::{QueueAdapter, RawStoreAdapter};
use tutordex_protocol::RawMessage;

use crate::backoff::Backoff;
use crate::error::CollectorError;
use crate::source::{RawUpdate, TelegramSource};

pub struct Collector<S: TelegramSource> {
    source: Arc<S>,
    raw_store: RawStoreAdapter,
    queue: QueueAdapter,
    pipeline_version: String,
    backfill_page_delay_ms: u64,
}

impl<S: TelegramSource> Collector<S> {
    pub fn new(
        source: Arc<S>,
        raw_store: RawStoreAdapter,
        queue: QueueAdapter,
        pipeline_version: impl Into<String>,
        backfill_page_delay_ms: u64,
    ) -> Self {
        Self {
            source,
            raw_store,
            queue,
            pipeline_version: pipeline_version.into(),
            backfill_page_delay_ms,
        }
    }

    /// Persist one update and enqueue it for extraction. Forwarded posts
    /// are filtered out here where it's cheap, before ever reaching the
    /// raw store.
    async fn ingest_one(&self, update: RawUpdate) -> Result<(), CollectorError> {
        if update.is_forwarded {
            tracing::debug!(
                channel_id = update.channel_id,
                message_id = update.message_id,
                "skipping forwarded post before persistence"
            );
            return Ok(());
        }

        let msg = RawMessage {
            id: 0,
            channel_id: update.channel_id,
            message_id: update.message_id,
            channel_username: update.channel_username,
            channel_title: update.channel_title,
            date: update.date,
            raw_text: update.raw_text,
            is_forwarded: update.is_forwarded,
            is_deleted: update.is_deleted,
            ingested_at: Utc::now(),
        };

        let raw_id = self.raw_store.upsert_raw(&msg).await?;
        self.queue.enqueue(raw_id, &self.pipeline_version).await?;
        Ok(())
    }

    /// Subscribe to the live stream and ingest every update as it arrives.
    /// Transient network errors on individual items retry with capped
    /// backoff; auth/session errors (surfaced as [`CollectorError::Auth`])
    /// propagate so the caller can exit non-zero.
    pub async fn tail(&self) -> Result<(), CollectorError> {
        let mut backoff = Backoff::new(500, 30_000);
        let mut stream = self.source.stream().await?;

        while let Some(item) = stream.next().await {
            match item {
                Ok(update) => {
                    backoff.reset();
                    if let Err(err) = self.ingest_one(update).await {
                        tracing::warn!(error = %err, "failed to persist tailed update, retrying after backoff");
                        sleep(backoff.next_delay()).await;
                    }
                }
                Err(CollectorError::Auth(msg)) => return Err(CollectorError::Auth(msg)),
                Err(err) => {
                    tracing::warn!(error = %err, "transient error in tail stream, backing off");
                    sleep(backoff.next_delay()).await;
                }
            }
        }
        Ok(())
    }

    /// Iterate history for each configured channel within `[since, until]`,
    /// with polite pacing between pages.
    pub async fn backfill(
        &self,
        channels: &[String],
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, CollectorError> {
        let mut backoff = Backoff::new(500, 30_000);
        let mut ingested = 0u64;

        for channel in channels {
            let mut stream = self.source.history(channel, since, until).await?;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(update) => {
                        backoff.reset();
                        self.ingest_one(update).await?;
                        ingested += 1;
                        sleep(Duration::from_millis(self.backfill_page_delay_ms)).await;
                    }
                    Err(CollectorError::Auth(msg)) => return Err(CollectorError::Auth(msg)),
                    Err(err) => {
                        tracing::warn!(error = %err, channel = %channel, "transient error in backfill, backing off");
                        sleep(backoff.next_delay()).await;
                    }
                }
            }
        }

        Ok(ingested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tutordex_db::pool::{create_pool, DbConfig};

    struct FakeSource {
        updates: Vec<Result<RawUpdate, CollectorError>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TelegramSource for FakeSource {
        async fn stream(&self) -> Result<BoxStream<'static, Result<RawUpdate, CollectorError>>, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(stream::iter(self.updates.clone())))
        }

        async fn history(
            &self,
            _channel: &str,
            _since: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> Result<BoxStream<'static, Result<RawUpdate, CollectorError>>, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(stream::iter(self.updates.clone())))
        }
    }

    fn sample_update(message_id: i64, forwarded: bool) -> RawUpdate {
        RawUpdate {
            channel_id: 1,
            message_id,
            channel_username: Some("tutoragency1".to_string()),
            channel_title: Some("Tutor Agency".to_string()),
            date: Utc::now(),
            raw_text: "P5 Math tutor needed, $50/h".to_string(),
            is_forwarded: forwarded,
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn forwarded_posts_never_reach_the_raw_store() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let raw_store = RawStoreAdapter::new(pool.clone());
        let queue = QueueAdapter::new(pool.clone());

        let source = Arc::new(FakeSource {
            updates: vec![Ok(sample_update(1, true)), Ok(sample_update(2, false))],
            calls: AtomicUsize::new(0),
        });
        let collector = Collector::new(source, raw_store, queue.clone(), "v1", 0);
        collector.tail().await.unwrap();

        let counts = queue.queue_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
    }

    #[tokio::test]
    async fn backfill_paces_between_pages_and_enqueues_each_update() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let raw_store = RawStoreAdapter::new(pool.clone());
        let queue = QueueAdapter::new(pool.clone());

        let source = Arc::new(FakeSource {
            updates: vec![Ok(sample_update(10, false)), Ok(sample_update(11, false))],
            calls: AtomicUsize::new(0),
        });
        let collector = Collector::new(source, raw_store, queue.clone(), "v1", 0);
        let ingested = collector
            .backfill(&["tutoragency1".to_string()], Utc::now(), Utc::now())
            .await
            .unwrap();

        assert_eq!(ingested, 2);
        let counts = queue.queue_counts().await.unwrap();
        assert_eq!(counts.pending, 2);
    }

    #[tokio::test]
    async fn auth_error_propagates_instead_of_retrying() {
        let pool = create_pool(DbConfig::sqlite_memory()).await.unwrap();
        let raw_store = RawStoreAdapter::new(pool.clone());
        let queue = QueueAdapter::new(pool.clone());

        let source = Arc::new(FakeSource {
            updates: vec![Err(CollectorError::Auth("session revoked".to_string()))],
            calls: AtomicUsize::new(0),
        });
        let collector = Collector::new(source, raw_store, queue, "v1", 0);
        let result = collector.tail().await;
        assert!(matches!(result, Err(CollectorError::Auth(_))));
    }
}
