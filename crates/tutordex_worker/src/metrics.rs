//! Orchestrator counters: jobs claimed/done/failed/skipped, per-error-kind
//! counts, LLM latency histogram, pool utilization, queue depth.
//!
//! Grounded on `casparian_sentinel::metrics::Metrics` — lock-free atomics,
//! single-writer-many-readers, `Ordering::Relaxed` for plain counters since
//! these feed a periodic log line / snapshot rather than a consistency
//! protocol.

use std::sync::atomic::{AtomicU64, Ordering};

use tutordex_protocol::ErrorKind;

/// Fixed latency bucket boundaries in milliseconds, upper-inclusive; the
/// last bucket catches everything above `LATENCY_BUCKETS_MS`'s final value.
pub const LATENCY_BUCKETS_MS: [u64; 8] = [100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

const ERROR_KIND_COUNT: usize = 19;

fn error_kind_index(kind: ErrorKind) -> usize {
    match kind {
        ErrorKind::FilteredForwarded => 0,
        ErrorKind::FilteredDeleted => 1,
        ErrorKind::FilteredShort => 2,
        ErrorKind::FilteredCompilation => 3,
        ErrorKind::FilteredNonAssignment => 4,
        ErrorKind::FilteredBlocklist => 5,
        ErrorKind::LlmNetworkTimeout => 6,
        ErrorKind::LlmRefused => 7,
        ErrorKind::Llm5xx => 8,
        ErrorKind::Llm4xx => 9,
        ErrorKind::LlmEmptyResponse => 10,
        ErrorKind::LlmInvalidJson => 11,
        ErrorKind::LlmSchemaShape => 12,
        ErrorKind::LlmCircuitOpen => 13,
        ErrorKind::ValidationFailed => 14,
        ErrorKind::DatastoreConflict => 15,
        ErrorKind::DatastoreUnreachable => 16,
        ErrorKind::Shutdown => 17,
        ErrorKind::BroadcastFailed | ErrorKind::DmFailed => 18,
    }
}

/// Orchestrator-wide metrics. One instance shared (via `Arc`) across all
/// worker tasks in a process.
pub struct Metrics {
    pub jobs_claimed: AtomicU64,
    pub jobs_done: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub jobs_skipped: AtomicU64,
    pub stale_requeued: AtomicU64,
    pub delivery_failures: AtomicU64,

    error_kind_counts: [AtomicU64; ERROR_KIND_COUNT],
    latency_buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],

    pub in_flight: AtomicU64,
    pub pool_capacity: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Metrics {
    pub fn new(pool_capacity: u64) -> Self {
        Self {
            jobs_claimed: AtomicU64::new(0),
            jobs_done: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            jobs_skipped: AtomicU64::new(0),
            stale_requeued: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            error_kind_counts: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            in_flight: AtomicU64::new(0),
            pool_capacity: AtomicU64::new(pool_capacity),
        }
    }

    pub fn record_claimed(&self, n: u64) {
        self.jobs_claimed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_done(&self) {
        self.jobs_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, kind: ErrorKind) {
        self.jobs_skipped.fetch_add(1, Ordering::Relaxed);
        self.error_kind_counts[error_kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, kind: ErrorKind) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        self.error_kind_counts[error_kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_requeued(&self, n: u64) {
        self.stale_requeued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one LLM call's latency into its bucket.
    pub fn record_llm_latency_ms(&self, latency_ms: u64) {
        let idx = LATENCY_BUCKETS_MS
            .iter()
            .position(|&bound| latency_ms <= bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency_buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_kind_count(&self, kind: ErrorKind) -> u64 {
        self.error_kind_counts[error_kind_index(kind)].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_claimed: self.jobs_claimed.load(Ordering::Relaxed),
            jobs_done: self.jobs_done.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_skipped: self.jobs_skipped.load(Ordering::Relaxed),
            stale_requeued: self.stale_requeued.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            pool_capacity: self.pool_capacity.load(Ordering::Relaxed),
            latency_histogram: self
                .latency_buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
        }
    }
}

/// Plain-data snapshot suitable for a periodic log line or a JSON status
/// endpoint; never aliases the live atomics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub jobs_claimed: u64,
    pub jobs_done: u64,
    pub jobs_failed: u64,
    pub jobs_skipped: u64,
    pub stale_requeued: u64,
    pub delivery_failures: u64,
    pub in_flight: u64,
    pub pool_capacity: u64,
    pub latency_histogram: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_partition_by_kind() {
        let metrics = Metrics::default();
        metrics.record_failed(ErrorKind::LlmNetworkTimeout);
        metrics.record_failed(ErrorKind::LlmNetworkTimeout);
        metrics.record_failed(ErrorKind::ValidationFailed);

        assert_eq!(metrics.error_kind_count(ErrorKind::LlmNetworkTimeout), 2);
        assert_eq!(metrics.error_kind_count(ErrorKind::ValidationFailed), 1);
        assert_eq!(metrics.jobs_failed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn latency_lands_in_the_right_bucket() {
        let metrics = Metrics::default();
        metrics.record_llm_latency_ms(50);
        metrics.record_llm_latency_ms(900);
        metrics.record_llm_latency_ms(50_000);

        let snap = metrics.snapshot();
        assert_eq!(snap.latency_histogram[0], 1); // <= 100ms
        assert_eq!(snap.latency_histogram[3], 1); // <= 1000ms
        assert_eq!(snap.latency_histogram[LATENCY_BUCKETS_MS.len()], 1); // overflow bucket
    }

    #[test]
    fn snapshot_is_a_point_in_time_copy() {
        let metrics = Metrics::default();
        metrics.record_done();
        let snap = metrics.snapshot();
        metrics.record_done();
        assert_eq!(snap.jobs_done, 1);
        assert_eq!(metrics.jobs_done.load(Ordering::Relaxed), 2);
    }
}
