//! Best-effort delivery side effects (C9): channel broadcast, per-tutor DM
//! fan-out, and a JSONL fallback sink for anything that fails to send.
//! Failures here never change job status.

pub mod broadcast;
pub mod dm;
pub mod error;
pub mod jsonl_sink;
pub mod rate_limit;
pub mod render;
pub mod telegram;

pub use broadcast::Broadcaster;
pub use dm::DmDispatcher;
pub use error::DeliveryError;
pub use jsonl_sink::JsonlSink;
pub use telegram::TelegramClient;

use tutordex_protocol::{Assignment, DeliveryConfig, DeliveryRecord};

/// Whether the job this assignment came from is part of a backfill run.
/// Backfills never broadcast or DM regardless of config flags.
pub struct DeliveryContext {
    pub is_backfill: bool,
}

pub struct DeliveryPipeline {
    config: DeliveryConfig,
    broadcaster: Option<Broadcaster>,
    dm: Option<DmDispatcher>,
}

impl DeliveryPipeline {
    pub fn new(config: DeliveryConfig, broadcaster: Option<Broadcaster>, dm: Option<DmDispatcher>) -> Self {
        Self { config, broadcaster, dm }
    }

    /// Run both best-effort side effects, gated by the backfill inhibition
    /// and by the per-side-effect config flags. Never returns an error:
    /// individual failures are already folded into the returned records.
    pub async fn run(&self, ctx: &DeliveryContext, assignment: &Assignment) -> Vec<DeliveryRecord> {
        if ctx.is_backfill {
            return Vec::new();
        }

        let mut records = Vec::new();

        if self.config.broadcast_enabled {
            if let Some(broadcaster) = &self.broadcaster {
                records.push(broadcaster.broadcast(assignment).await);
            }
        }

        if self.config.dms_enabled {
            if let Some(dm) = &self.dm {
                records.extend(dm.dispatch(assignment).await);
            }
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tutordex_protocol::{AssignmentStatus, FreshnessTier, ParsedAssignment, Signals};

    fn sample_assignment() -> Assignment {
        Assignment {
            channel_id: 1,
            message_id: 1,
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
    async fn backfill_never_delivers_regardless_of_flags() {
        let pipeline = DeliveryPipeline::new(
            DeliveryConfig { broadcast_enabled: true, dms_enabled: true, ..Default::default() },
            None,
            None,
        );
        let ctx = DeliveryContext { is_backfill: true };
        let records = pipeline.run(&ctx, &sample_assignment()).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn disabled_flags_skip_even_outside_backfill() {
        let pipeline = DeliveryPipeline::new(
            DeliveryConfig { broadcast_enabled: false, dms_enabled: false, ..Default::default() },
            None,
            None,
        );
        let ctx = DeliveryContext { is_backfill: false };
        let records = pipeline.run(&ctx, &sample_assignment()).await;
        assert!(records.is_empty());
    }
}
