//! Per-tutor DM dispatch: query the matcher, filter by
//! `min_match_score`, rate-limit, and skip chats recently DMed for the
//! same assignment.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tutordex_protocol::{Assignment, DeliveryKind, DeliveryRecord};

use crate::error::DeliveryError;
use crate::rate_limit::{RecentDmCache, TokenBucket};
use crate::render::render_assignment;
use crate::telegram::TelegramClient;

#[derive(Debug, Deserialize)]
struct MatchHit {
    chat_id: i64,
    score: f64,
}

pub struct DmDispatcher {
    http: reqwest::Client,
    matcher_url: String,
    telegram: TelegramClient,
    min_match_score: f64,
    bucket: Arc<TokenBucket>,
    recent: RecentDmCache,
}

impl DmDispatcher {
    pub fn new(
        matcher_url: impl Into<String>,
        telegram: TelegramClient,
        min_match_score: f64,
        bucket: Arc<TokenBucket>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            matcher_url: matcher_url.into(),
            telegram,
            min_match_score,
            bucket,
            recent: RecentDmCache::new(Duration::from_secs(24 * 3600)),
        }
    }

    async fn matches(&self, assignment: &Assignment) -> Result<Vec<MatchHit>, DeliveryError> {
        let url = format!("{}/match/payload", self.matcher_url);
        let response = self.http.post(&url).json(&json!({ "assignment": assignment })).send().await?;
        let hits: Vec<MatchHit> = response.json().await.map_err(DeliveryError::Network)?;
        Ok(hits)
    }

    /// Dispatch DMs for every matcher hit at or above the configured
    /// threshold, respecting the global rate limit and the per-chat,
    /// per-assignment recent-DM skip.
    pub async fn dispatch(&self, assignment: &Assignment) -> Vec<DeliveryRecord> {
        let hits = match self.matches(assignment).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(
                    channel_id = assignment.channel_id,
                    message_id = assignment.message_id,
                    error = %err,
                    "matcher call failed, skipping DM fan-out"
                );
                return Vec::new();
            }
        };

        let html = render_assignment(assignment);
        let mut records = Vec::new();

        for hit in hits.into_iter().filter(|h| h.score >= self.min_match_score) {
            if self.recent.should_skip_and_record(hit.chat_id, assignment.channel_id, assignment.message_id) {
                continue;
            }

            self.bucket.acquire().await;
            let record = match self.telegram.send_message(hit.chat_id, &html).await {
                Ok(()) => DeliveryRecord {
                    kind: DeliveryKind::Dm,
                    channel_id: assignment.channel_id,
                    message_id: assignment.message_id,
                    chat_id: Some(hit.chat_id),
                    succeeded: true,
                    error: None,
                    attempted_at: Utc::now(),
                },
                Err(err) => {
                    tracing::warn!(chat_id = hit.chat_id, error = %err, "DM send failed");
                    DeliveryRecord {
                        kind: DeliveryKind::Dm,
                        channel_id: assignment.channel_id,
                        message_id: assignment.message_id,
                        chat_id: Some(hit.chat_id),
                        succeeded: false,
                        error: Some(err.to_string()),
                        attempted_at: Utc::now(),
                    }
                }
            };
            records.push(record);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_hits_below_threshold_are_excluded() {
        let hits = vec![
            MatchHit { chat_id: 1, score: 0.9 },
            MatchHit { chat_id: 2, score: 0.2 },
        ];
        let min_score = 0.5;
        let kept: Vec<_> = hits.into_iter().filter(|h| h.score >= min_score).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chat_id, 1);
    }
}
