//! Dispatch for each CLI subcommand.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tutordex_collector::Collector;
use tutordex_worker::{install_signal_handlers, Metrics, Orchestrator, PipelineContext, ShutdownSignal};

use crate::config::ResolvedConfig;
use crate::telegram_source::BotApiSource;
use crate::wiring::{build_pipeline_context, Wiring};

fn channels_or_config(cli_channels: Vec<String>, resolved: &ResolvedConfig) -> Vec<String> {
    if cli_channels.is_empty() {
        resolved.config.channels.clone()
    } else {
        cli_channels
    }
}

pub async fn collector_tail(resolved: &ResolvedConfig, cli_channels: Vec<String>) -> Result<()> {
    let channels = channels_or_config(cli_channels, resolved);
    anyhow::ensure!(!resolved.telegram_bot_token.is_empty(), "TELEGRAM_BOT_TOKEN must be set for collector tail");

    let wiring = Wiring::connect(&resolved.config).await?;
    let source = Arc::new(BotApiSource::new(resolved.telegram_bot_token.clone(), channels));
    let collector = Collector::new(
        source,
        wiring.raw_store.clone(),
        wiring.queue.clone(),
        resolved.config.pipeline_version.clone(),
        0,
    );

    tracing::info!("starting collector tail");
    collector.tail().await.context("collector tail exited with an error")?;
    Ok(())
}

pub async fn collector_backfill(
    resolved: &ResolvedConfig,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    cli_channels: Vec<String>,
) -> Result<()> {
    let channels = channels_or_config(cli_channels, resolved);
    anyhow::ensure!(!channels.is_empty(), "backfill needs at least one channel, from --channels or config");
    anyhow::ensure!(!resolved.telegram_bot_token.is_empty(), "TELEGRAM_BOT_TOKEN must be set for collector backfill");

    let wiring = Wiring::connect(&resolved.config).await?;
    let source = Arc::new(BotApiSource::new(resolved.telegram_bot_token.clone(), channels.clone()));
    let collector = Collector::new(
        source,
        wiring.raw_store.clone(),
        wiring.queue.clone(),
        resolved.config.pipeline_version.clone(),
        250,
    );

    tracing::info!(?channels, %since, %until, "starting collector backfill");
    let ingested = collector.backfill(&channels, since, until).await.context("backfill failed")?;
    tracing::info!(ingested, "backfill complete");
    Ok(())
}

pub async fn worker_run(resolved: &ResolvedConfig, workers_override: Option<usize>) -> Result<()> {
    let wiring = Wiring::connect(&resolved.config).await?;
    let ctx = build_pipeline_context(resolved, &wiring, false);

    let mut orchestrator_config = resolved.config.orchestrator.clone();
    if let Some(workers) = workers_override {
        orchestrator_config.workers = workers;
    }

    let shutdown = ShutdownSignal::new();
    install_signal_handlers(shutdown.clone());

    let orchestrator = Orchestrator::new(ctx, orchestrator_config, shutdown, "tutordex-worker");
    tracing::info!("starting worker orchestrator");
    orchestrator.run().await;
    let snapshot = orchestrator.metrics().snapshot();
    tracing::info!(?snapshot, "worker orchestrator exited");
    Ok(())
}

/// Claim whatever is pending right now, process it, and exit without
/// entering the orchestrator's indefinite claim loop.
pub async fn worker_oneshot(resolved: &ResolvedConfig) -> Result<()> {
    let wiring = Wiring::connect(&resolved.config).await?;
    let ctx = build_pipeline_context(resolved, &wiring, false);
    let metrics = Arc::new(Metrics::new(resolved.config.orchestrator.workers as u64));

    let claimant = format!("tutordex-oneshot-{}", std::process::id());
    let jobs = wiring.queue.claim(resolved.config.orchestrator.claim_batch, &claimant).await?;
    tracing::info!(count = jobs.len(), "oneshot claimed jobs");

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let ctx = ctx.clone();
            let claimant = claimant.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                if let Err(err) = process_job(&ctx, job, &claimant, &metrics).await {
                    tracing::error!(error = %err, "oneshot job processing failed");
                }
            })
        })
        .collect();

    join_all(handles).await;
    let snapshot = metrics.snapshot();
    tracing::info!(?snapshot, "oneshot run complete");
    Ok(())
}

async fn process_job(
    ctx: &PipelineContext,
    job: tutordex_protocol::ExtractionJob,
    claimant: &str,
    metrics: &Arc<Metrics>,
) -> Result<()> {
    tutordex_worker::pipeline::process(ctx, &job, claimant, metrics)
        .await
        .map_err(anyhow::Error::from)
}

pub async fn requeue_stale(resolved: &ResolvedConfig) -> Result<()> {
    let wiring = Wiring::connect(&resolved.config).await?;
    let count = wiring
        .queue
        .requeue_stale(
            resolved.config.orchestrator.stale_after_s as i64,
            resolved.config.orchestrator.max_attempts,
        )
        .await?;
    tracing::info!(count, "requeued stale jobs");
    Ok(())
}
