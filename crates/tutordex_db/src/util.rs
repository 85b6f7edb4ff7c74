use chrono::{DateTime, Utc};

/// SQLite has no native timestamp type; every table stores RFC 3339 text.
/// Malformed rows (shouldn't happen outside of manual DB surgery) fall back
/// to "now" rather than panicking a worker.
pub(crate) fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
