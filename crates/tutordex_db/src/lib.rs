//! Datastore adapters for the TutorDex extraction pipeline.
//!
//! Three adapters over one SQLite pool: [`raw::RawStoreAdapter`] (C1),
//! [`queue::QueueAdapter`] (C2), and [`assignments::AssignmentStoreAdapter`]
//! (C8). Split the way `casparian_sentinel::db` separates `queue` from the
//! models it moves, rather than one god object.

pub mod assignments;
pub mod error;
pub mod pool;
pub mod queue;
pub mod raw;
mod util;

pub use assignments::AssignmentStoreAdapter;
pub use error::DbError;
pub use pool::{create_pool, DbConfig};
pub use queue::{QueueAdapter, QueueCounts};
pub use raw::RawStoreAdapter;
