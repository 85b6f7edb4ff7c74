//! Channel broadcast. On send failure the rendered payload
//! is appended to the JSONL fallback sink so nothing is lost; the failure
//! itself never changes job status.

use chrono::Utc;
use serde_json::json;
use tutordex_protocol::{Assignment, DeliveryKind, DeliveryRecord};

use crate::jsonl_sink::JsonlSink;
use crate::render::render_assignment;
use crate::telegram::TelegramClient;

pub struct Broadcaster {
    telegram: TelegramClient,
    channel: String,
    fallback: JsonlSink,
}

impl Broadcaster {
    pub fn new(telegram: TelegramClient, channel: impl Into<String>, fallback: JsonlSink) -> Self {
        Self { telegram, channel: channel.into(), fallback }
    }

    /// Send to the configured broadcast channel. Best-effort: logs and
    /// records the failure but never propagates it to the caller as a
    /// pipeline error.
    pub async fn broadcast(&self, assignment: &Assignment) -> DeliveryRecord {
        let channel_id: i64 = self.channel.parse().unwrap_or(assignment.channel_id);
        let html = render_assignment(assignment);

        match self.telegram.send_message(channel_id, &html).await {
            Ok(()) => DeliveryRecord {
                kind: DeliveryKind::Broadcast,
                channel_id: assignment.channel_id,
                message_id: assignment.message_id,
                chat_id: Some(channel_id),
                succeeded: true,
                error: None,
                attempted_at: Utc::now(),
            },
            Err(err) => {
                tracing::warn!(
                    channel_id = assignment.channel_id,
                    message_id = assignment.message_id,
                    error = %err,
                    "broadcast send failed, writing to fallback sink"
                );
                let _ = self.fallback.append(&json!({
                    "channel_id": assignment.channel_id,
                    "message_id": assignment.message_id,
                    "html": html,
                    "error": err.to_string(),
                    "attempted_at": Utc::now().to_rfc3339(),
                }));
                DeliveryRecord {
                    kind: DeliveryKind::Broadcast,
                    channel_id: assignment.channel_id,
                    message_id: assignment.message_id,
                    chat_id: Some(channel_id),
                    succeeded: false,
                    error: Some(err.to_string()),
                    attempted_at: Utc::now(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tutordex_protocol::{AssignmentStatus, FreshnessTier, ParsedAssignment, Signals};

    fn sample_assignment() -> Assignment {
        Assignment {
            channel_id: 100,
            message_id: 200,
            parsed: ParsedAssignment::default(),
            signals: Signals::default(),
            postal_lat: None,
            postal_lon: None,
            status: AssignmentStatus::Open,
            freshness_tier: FreshnessTier::Green,
            published_at: Utc::now(),
            updated_at: Utc::now(),
            duplicate_group_id: None,
            is_primary_in_group: true,
            duplicate_confidence_score: None,
        }
    }

    #[tokio::test]
    async fn failed_broadcast_falls_back_to_jsonl_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink_path = dir.path().join("broadcast_failures.jsonl");
        let sink = JsonlSink::open(&sink_path).unwrap();
        // Unroutable bot token against an unreachable host stands in for a
        // hard network failure without making a real Telegram call.
        let telegram = TelegramClient::new("invalid-token", 200);
        let broadcaster = Broadcaster::new(telegram, "not-a-channel-id", sink);

        let record = broadcaster.broadcast(&sample_assignment()).await;
        assert!(!record.succeeded);

        let content = std::fs::read_to_string(&sink_path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
