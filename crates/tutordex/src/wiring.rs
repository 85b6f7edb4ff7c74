//! Builds the shared adapters/clients out of a resolved [`Config`] and
//! wires them into a [`PipelineContext`] / [`Orchestrator`] pair. Kept
//! separate from `main.rs` so each CLI command builds only what it needs.

use std::sync::Arc;

use anyhow::Result;
use tutordex_db::pool::{create_pool, DbConfig};
use tutordex_db::{AssignmentStoreAdapter, QueueAdapter, RawStoreAdapter};
use tutordex_delivery::{Broadcaster, DeliveryPipeline, DmDispatcher, JsonlSink, TelegramClient};
use tutordex_enrich::EnrichmentPipeline;
use tutordex_llm::{LlmClient, PromptLibrary, GENERAL_EXAMPLE_SET};
use tutordex_protocol::Config;
use tutordex_worker::PipelineContext;

use crate::config::ResolvedConfig;

const SYSTEM_PROMPT: &str = "You extract structured tutoring assignment listings from Telegram \
posts written by Singapore tuition agencies. Respond with a single JSON object matching the \
supplied schema and never invent a value that is not present in the post; omit or null any field \
you cannot find instead of guessing.";

const GENERAL_EXAMPLES: &str = "Example: \"P5 Math, Bishan 570xxx, Mon/Wed 5-7pm, $50/h, online ok\" \
-> assignment_code: null, address: [\"Bishan\"], postal_code: [\"570xxx\"], \
lesson_schedule: [{day: mon, start: 17:00, end: 19:00}, {day: wed, start: 17:00, end: 19:00}], \
rate: {min: 50, max: 50}, learning_mode: {online: true, in_person: true}.";

pub struct Wiring {
    pub pool: sqlx::SqlitePool,
    pub raw_store: RawStoreAdapter,
    pub queue: QueueAdapter,
    pub assignment_store: AssignmentStoreAdapter,
}

impl Wiring {
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = create_pool(DbConfig::from_url(config.database_url.clone())).await?;
        Ok(Self {
            raw_store: RawStoreAdapter::new(pool.clone()),
            queue: QueueAdapter::new(pool.clone()),
            assignment_store: AssignmentStoreAdapter::new(pool.clone()),
            pool,
        })
    }
}

/// Build the per-job pipeline context a worker orchestrator needs.
/// `is_backfill` pins whether delivery is ever attempted for jobs processed
/// by this context.
pub fn build_pipeline_context(
    resolved: &ResolvedConfig,
    wiring: &Wiring,
    is_backfill: bool,
) -> PipelineContext {
    let config = &resolved.config;

    let llm_client = LlmClient::new(
        config.llm.api_url.clone(),
        resolved.llm_api_key.clone(),
        config.llm.model.clone(),
        config.llm.timeout_ms,
        config.llm.max_tokens,
        config.llm.temperature,
        config.llm.circuit_threshold,
        config.llm.circuit_cooldown_s,
    );

    let prompt_library = Arc::new(
        PromptLibrary::new(SYSTEM_PROMPT).with_example_set(GENERAL_EXAMPLE_SET, GENERAL_EXAMPLES),
    );

    let enrichment = Arc::new(EnrichmentPipeline::new(config.enrichment.clone()));

    let delivery_config = config.delivery_enabled_for(is_backfill);
    let delivery = Arc::new(build_delivery_pipeline(resolved, &delivery_config));

    PipelineContext {
        raw_store: wiring.raw_store.clone(),
        queue: wiring.queue.clone(),
        assignment_store: wiring.assignment_store.clone(),
        prompt_library,
        llm_client,
        enrichment,
        delivery,
        filter_config: config.filter.clone(),
        max_attempts: config.orchestrator.max_attempts,
        dedup_window_hours: config.enrichment.dedup_window_hours,
        is_backfill,
    }
}

fn build_delivery_pipeline(
    resolved: &ResolvedConfig,
    delivery_config: &tutordex_protocol::DeliveryConfig,
) -> DeliveryPipeline {
    if resolved.telegram_bot_token.is_empty() {
        tracing::warn!("TELEGRAM_BOT_TOKEN not set, broadcast/DM delivery is disabled for this run");
        return DeliveryPipeline::new(delivery_config.clone(), None, None);
    }

    let fallback_sink = JsonlSink::open(&delivery_config.jsonl_fallback_path).ok();

    let broadcaster = if delivery_config.broadcast_enabled {
        fallback_sink.map(|sink| {
            Broadcaster::new(
                TelegramClient::new(resolved.telegram_bot_token.clone(), 10_000),
                delivery_config.broadcast_channel.clone(),
                sink,
            )
        })
    } else {
        None
    };

    let dm = if delivery_config.dms_enabled {
        let bucket = Arc::new(tutordex_delivery::rate_limit::TokenBucket::new(20, 1.0));
        Some(DmDispatcher::new(
            delivery_config.matcher_url.clone(),
            TelegramClient::new(resolved.telegram_bot_token.clone(), 10_000),
            delivery_config.min_match_score,
            bucket,
        ))
    } else {
        None
    };

    DeliveryPipeline::new(delivery_config.clone(), broadcaster, dm)
}
