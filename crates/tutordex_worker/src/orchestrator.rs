//! Worker pool orchestration.
//!
//! Grounded on `casparian_worker`'s bounded-concurrency claim loop: a fixed
//! number of tasks repeatedly claim a batch of pending jobs, process them
//! concurrently up to `workers`, and back off with jittered sleep when the
//! queue is empty. A separate periodic task requeues stale `processing`
//! jobs so a crashed worker never strands a job forever (invariant I3).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tutordex_protocol::OrchestratorConfig;

use crate::metrics::Metrics;
use crate::pipeline::{process, PipelineContext};
use crate::shutdown::ShutdownSignal;

pub struct Orchestrator {
    ctx: PipelineContext,
    config: OrchestratorConfig,
    metrics: Arc<Metrics>,
    shutdown: ShutdownSignal,
    claimant_prefix: String,
}

impl Orchestrator {
    pub fn new(
        ctx: PipelineContext,
        config: OrchestratorConfig,
        shutdown: ShutdownSignal,
        claimant_prefix: impl Into<String>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new(config.workers as u64));
        Self {
            ctx,
            config,
            metrics,
            shutdown,
            claimant_prefix: claimant_prefix.into(),
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Claim and process jobs until `shutdown` is triggered, then drain
    /// in-flight work up to `shutdown_grace_s` before returning.
    pub async fn run(&self) {
        let stale_sweep = tokio::spawn(stale_sweep_loop(
            self.ctx.queue.clone(),
            self.metrics.clone(),
            self.config.stale_after_s as i64,
            self.config.max_attempts,
            self.config.stale_sweep_s,
            self.shutdown.clone(),
        ));

        self.claim_loop().await;

        // stale_sweep exits on its own once shutdown is observed; wait for
        // it so its last sweep (covering jobs that just went stale) lands
        // before the process exits.
        let _ = stale_sweep.await;
    }

    async fn claim_loop(&self) {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut in_flight: Vec<(i64, tokio::task::JoinHandle<()>)> = Vec::new();
        let mut backoff = Duration::from_millis(200);
        let idle_max = Duration::from_secs(self.config.idle_max_s);

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            let jobs = match self.ctx.queue.claim(self.config.claim_batch, &self.claimant()).await
            {
                Ok(jobs) => jobs,
                Err(err) => {
                    tracing::error!(error = %err, "failed to claim jobs, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(idle_max);
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = self.shutdown.triggered() => {}
                }
                backoff = (backoff * 2).min(idle_max);
                continue;
            }
            backoff = Duration::from_millis(200);
            self.metrics.record_claimed(jobs.len() as u64);

            for job in jobs {
                let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
                let ctx = self.ctx.clone();
                let metrics = self.metrics.clone();
                let claimant = self.claimant();
                let job_id = job.id;

                self.metrics.in_flight.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(err) = process(&ctx, &job, &claimant, &metrics).await {
                        tracing::error!(job_id = job.id, error = %err, "pipeline processing hit a datastore error");
                    }
                    metrics.in_flight.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                });
                in_flight.push((job_id, handle));
            }

            // Bound the buffer of tracked handles; completed ones are cheap
            // to drop so this just prevents unbounded growth on a long run.
            in_flight.retain(|(_, h)| !h.is_finished());
        }

        let grace = Duration::from_secs(self.config.shutdown_grace_s);
        tracing::info!(pending = in_flight.len(), grace_s = grace.as_secs(), "draining in-flight jobs before exit");
        let claimant = self.claimant();
        let handles = in_flight.drain(..).collect::<Vec<_>>();
        let job_ids: Vec<i64> = handles.iter().map(|(id, _)| *id).collect();
        let drain = futures::future::join_all(handles.into_iter().map(|(_, h)| h));
        if tokio::time::timeout(grace, drain).await.is_err() {
            // spec.md §4.10: anything still in flight when the grace period
            // elapses is marked `failed` with kind `shutdown` so the next
            // stale sweep (or a future worker) picks it back up.
            tracing::warn!(count = job_ids.len(), "shutdown grace period elapsed with jobs still in flight");
            for job_id in job_ids {
                if let Err(err) = self
                    .ctx
                    .queue
                    .fail(
                        job_id,
                        &claimant,
                        tutordex_protocol::ErrorKind::Shutdown,
                        "shutdown grace period elapsed",
                        self.config.max_attempts,
                    )
                    .await
                {
                    tracing::debug!(job_id, error = %err, "job already completed before shutdown mark-failed ran");
                }
            }
        }
    }

    fn claimant(&self) -> String {
        format!("{}-{}", self.claimant_prefix, std::process::id())
    }
}

async fn stale_sweep_loop(
    queue: tutordex_db::QueueAdapter,
    metrics: Arc<Metrics>,
    stale_after_s: i64,
    max_attempts: i32,
    sweep_interval_s: u64,
    shutdown: ShutdownSignal,
) {
    let interval = Duration::from_secs(sweep_interval_s.max(1));
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.triggered() => {
                let _ = sweep_once(&queue, &metrics, stale_after_s, max_attempts).await;
                break;
            }
        }
        if sweep_once(&queue, &metrics, stale_after_s, max_attempts).await.is_none() {
            continue;
        }
        if shutdown.is_triggered() {
            break;
        }
    }
}

async fn sweep_once(
    queue: &tutordex_db::QueueAdapter,
    metrics: &Metrics,
    stale_after_s: i64,
    max_attempts: i32,
) -> Option<()> {
    match queue.requeue_stale(stale_after_s, max_attempts).await {
        Ok(count) => {
            if count > 0 {
                metrics.record_stale_requeued(count);
            }
            Some(())
        }
        Err(err) => {
            tracing::error!(error = %err, "stale sweep failed");
            None
        }
    }
}
