//! Per-job pipeline: C4 (filter) -> C5 (LLM) -> C6 (enrichment) -> C7
//! (validate, folded into C6's validated input) -> C8 (upsert) -> C9
//! (best-effort delivery), wired in a straight-line order.
//! [`Orchestrator`](crate::orchestrator::Orchestrator) calls
//! [`PipelineContext::process`] once per claimed job.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tutordex_db::{AssignmentStoreAdapter, QueueAdapter, RawStoreAdapter};
use tutordex_delivery::DeliveryPipeline;
use tutordex_enrich::{self, validate, EnrichmentPipeline, FilterOutcome};
use tutordex_llm::{LlmClient, PromptLibrary};
use tutordex_protocol::{ErrorKind, ExtractionJob, FilterConfig};

use crate::metrics::Metrics;

/// Everything one job's processing needs a shared reference to. Cloned
/// (cheaply — every field is an `Arc` or a `Clone`-cheap adapter) into each
/// concurrent worker task.
#[derive(Clone)]
pub struct PipelineContext {
    pub raw_store: RawStoreAdapter,
    pub queue: QueueAdapter,
    pub assignment_store: AssignmentStoreAdapter,
    pub prompt_library: Arc<PromptLibrary>,
    pub llm_client: LlmClient,
    pub enrichment: Arc<EnrichmentPipeline>,
    pub delivery: Arc<DeliveryPipeline>,
    pub filter_config: FilterConfig,
    pub max_attempts: i32,
    pub dedup_window_hours: i64,
    /// Fixed for the lifetime of one orchestrator run: backfill runs never
    /// broadcast or DM regardless of config flags.
    pub is_backfill: bool,
}

/// Process one claimed job end to end. Never returns an `Err` for
/// pipeline-internal failures — every failure path calls `queue.fail` or
/// `queue.complete_with_meta` itself and returns `Ok(())`, so the caller
/// only needs to react to infrastructure failures (the queue call itself
/// not going through).
pub async fn process(
    ctx: &PipelineContext,
    job: &ExtractionJob,
    claimant: &str,
    metrics: &Arc<Metrics>,
) -> Result<(), tutordex_db::DbError> {
    let Some(raw) = ctx.raw_store.get_raw(job.raw_id).await? else {
        // The raw row should always exist for a job we just claimed; treat
        // a missing row as a permanent validation failure rather than
        // panicking the worker task.
        ctx.queue
            .fail(
                job.id,
                claimant,
                ErrorKind::ValidationFailed,
                "raw message not found",
                ctx.max_attempts,
            )
            .await?;
        metrics.record_failed(ErrorKind::ValidationFailed);
        return Ok(());
    };

    let outcome = tutordex_enrich::filter::evaluate(&raw, &ctx.filter_config);
    let text = match outcome {
        FilterOutcome::Skip(reason) => {
            ctx.queue
                .complete_with_meta(job.id, claimant, &json!({ "skip_reason": reason.as_str() }))
                .await?;
            metrics.record_skipped(reason);
            return Ok(());
        }
        FilterOutcome::Proceed(text) => text,
    };

    let channel = ctx
        .raw_store
        .get_channel(raw.channel_id)
        .await?
        .and_then(|c| c.username)
        .unwrap_or_else(|| raw.channel_id.to_string());

    let prompt = ctx.prompt_library.build(&channel, None, &text);

    let started = std::time::Instant::now();
    let llm_result = ctx.llm_client.extract(&prompt).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    metrics.record_llm_latency_ms(latency_ms);

    let llm_output = match llm_result {
        Ok(value) => value,
        Err(err) => {
            let kind = err.to_error_kind();
            ctx.queue
                .fail(job.id, claimant, kind, &err.to_string(), ctx.max_attempts)
                .await?;
            metrics.record_failed(kind);
            return Ok(());
        }
    };

    if !llm_output.is_object() {
        let kind = ErrorKind::LlmSchemaShape;
        ctx.queue
            .fail(job.id, claimant, kind, "LLM response was not a JSON object", ctx.max_attempts)
            .await?;
        metrics.record_failed(kind);
        return Ok(());
    }

    let raw_parsed: validate::RawParsedAssignment = match serde_json::from_value(llm_output.clone()) {
        Ok(r) => r,
        Err(err) => {
            let kind = ErrorKind::LlmSchemaShape;
            ctx.queue
                .fail(job.id, claimant, kind, &err.to_string(), ctx.max_attempts)
                .await?;
            metrics.record_failed(kind);
            return Ok(());
        }
    };
    let parsed = validate::validate(raw_parsed);

    let since = Utc::now() - chrono::Duration::hours(ctx.dedup_window_hours);
    let recent = ctx.assignment_store.recent_for_dedup(since).await?;
    let existing_fingerprints = fingerprints_of(&recent);

    let key = (raw.channel_id, raw.message_id);
    let (parsed, signals, coords, dup, provenance) = ctx
        .enrichment
        .run(&text, parsed, key, &existing_fingerprints)
        .await;

    let now = Utc::now();
    let assignment = tutordex_enrich::build_assignment(
        raw.channel_id,
        raw.message_id,
        parsed,
        signals,
        coords,
        dup,
        now,
    );

    ctx.assignment_store.upsert_assignment(&assignment).await?;

    let meta = json!({
        "llm": {
            "model_latency_ms": latency_ms,
            "prompt_fingerprint": prompt.prompt_fingerprint,
            "raw_output": llm_output,
        },
        "enrichment": {
            "postal_source": provenance.postal_source,
            "schedule_had_note": provenance.schedule_had_note,
            "tutor_type_hits": provenance.tutor_type_hits,
            "geocoded": provenance.geocoded,
            "duplicate_group_id": provenance.duplicate_group_id,
        },
    });
    ctx.queue.complete_with_meta(job.id, claimant, &meta).await?;
    metrics.record_done();

    // C9: fire-and-forget, best-effort, on its own task so a slow broadcast
    // or DM fan-out never delays the next claim. Failures are logged and
    // counted but never regress job status (invariant I6 / testable
    // property P5) — the job was already marked `done` above.
    let delivery = ctx.delivery.clone();
    let delivery_metrics = metrics.clone();
    let delivery_ctx = tutordex_delivery::DeliveryContext { is_backfill: ctx.is_backfill };
    tokio::spawn(async move {
        let records = delivery.run(&delivery_ctx, &assignment).await;
        for record in &records {
            if !record.succeeded {
                delivery_metrics.record_delivery_failure();
                tracing::warn!(
                    kind = ?record.kind,
                    chat_id = ?record.chat_id,
                    error = ?record.error,
                    "best-effort delivery failed"
                );
            }
        }
    });

    Ok(())
}

/// Recompute each recent assignment's dedup fingerprint from its stored
/// signals, oldest-first (matching `recent_for_dedup`'s ordering) so
/// `dedup::resolve_duplicate`'s tie-break sees candidates in commit order.
fn fingerprints_of(recent: &[tutordex_protocol::Assignment]) -> Vec<(String, (i64, i64))> {
    recent
        .iter()
        .map(|a| {
            let schedule_days: Vec<String> = a
                .parsed
                .lesson_schedule
                .iter()
                .filter_map(|s| s.day)
                .map(|d| format!("{d:?}").to_ascii_lowercase())
                .collect();
            let fp = tutordex_enrich::dedup::fingerprint(&a.signals, &schedule_days);
            (fp, (a.channel_id, a.message_id))
        })
        .collect()
}
