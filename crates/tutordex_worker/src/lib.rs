//! Worker orchestrator for the TutorDex extraction pipeline.
//!
//! Ties the datastore, LLM client, enrichment pipeline and delivery
//! pipeline together behind a bounded-concurrency claim loop with graceful
//! shutdown and stale-job recovery.

pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod shutdown;

pub use error::WorkerError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use orchestrator::Orchestrator;
pub use pipeline::PipelineContext;
pub use shutdown::{install_signal_handlers, ShutdownSignal};
