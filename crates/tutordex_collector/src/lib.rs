//! Telegram tail/backfill ingestion (C3): funnels external updates through
//! the raw store (C1) and into the work queue (C2).

pub mod backoff;
pub mod collector;
pub mod error;
pub mod source;

pub use collector::Collector;
pub use error::CollectorError;
pub use source::{RawUpdate, TelegramSource};
