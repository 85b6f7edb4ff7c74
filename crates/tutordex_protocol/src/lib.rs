//! Shared domain types, error kinds, and configuration schema for the
//! TutorDex extraction pipeline.
//!
//! Kept dependency-free of `sqlx`/`reqwest`/`tokio` on purpose: every other
//! crate in the workspace depends on this one, so it stays a plain data
//! crate (mirrors `casparian_protocol`'s role relative to
//! `casparian_db`/`casparian_worker`).

pub mod config;
pub mod types;

pub use config::Config;
pub use types::*;

/// Content fingerprint used to stamp prompts and example sets into
/// `ExtractionJob.meta` for provenance.
pub fn content_fingerprint(data: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_fingerprint_is_deterministic() {
        assert_eq!(content_fingerprint("hello"), content_fingerprint("hello"));
        assert_ne!(content_fingerprint("hello"), content_fingerprint("world"));
    }
}
