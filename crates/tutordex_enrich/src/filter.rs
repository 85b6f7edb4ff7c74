//! Filter & Triage (C4).
//!
//! A discriminated result rather than early-return exceptions, so the
//! worker's main flow stays a straight-line pipeline over `FilterOutcome`
//! instead of threading error variants through a `Result`.

use regex::Regex;
use std::sync::OnceLock;
use tutordex_protocol::{ErrorKind, FilterConfig, RawMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Proceed(String),
    Skip(ErrorKind),
}

fn assignment_code_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[A-Za-z]\d+\s*[-:]").unwrap())
}

fn agency_listing_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)^\s*(tuition|assignment)\s*#?\d+\s*[-:]").unwrap())
}

/// Evaluate the ordered skip rules against one raw message. Each rule
/// short-circuits into `Skip` with its reason; falling through every rule
/// yields `Proceed` with the text the LLM will see.
pub fn evaluate(msg: &RawMessage, config: &FilterConfig) -> FilterOutcome {
    if msg.is_forwarded {
        return FilterOutcome::Skip(ErrorKind::FilteredForwarded);
    }
    if msg.is_deleted {
        return FilterOutcome::Skip(ErrorKind::FilteredDeleted);
    }

    let text = msg.raw_text.trim();
    if text.is_empty() {
        return FilterOutcome::Skip(ErrorKind::FilteredShort);
    }
    if text.chars().count() < config.min_chars {
        return FilterOutcome::Skip(ErrorKind::FilteredShort);
    }

    for pattern in &config.blocklist_patterns {
        if let Ok(re) = Regex::new(pattern) {
            if re.is_match(text) {
                return FilterOutcome::Skip(ErrorKind::FilteredBlocklist);
            }
        }
    }

    let assignment_heading_count = assignment_code_heading_re().find_iter(text).count();
    let agency_heading_count = agency_listing_heading_re().find_iter(text).count();
    if assignment_heading_count >= config.compilation_threshold
        || agency_heading_count >= config.compilation_threshold
    {
        return FilterOutcome::Skip(ErrorKind::FilteredCompilation);
    }

    if is_non_assignment(text) {
        return FilterOutcome::Skip(ErrorKind::FilteredNonAssignment);
    }

    FilterOutcome::Proceed(text.to_string())
}

/// Cheap heuristic for greetings/news/announcements with no assignment
/// content: short text with none of the markers an assignment post nearly
/// always carries (a rate, a level, or a schedule word).
fn is_non_assignment(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let has_rate_marker = lower.contains('$') || lower.contains("/hr") || lower.contains("per hour");
    let has_level_marker = ["primary", "secondary", "jc", "p1", "p2", "p3", "p4", "p5", "p6", "sec"]
        .iter()
        .any(|m| lower.contains(m));
    let has_schedule_marker = ["mon", "tue", "wed", "thu", "fri", "sat", "sun", "weekly", "lesson"]
        .iter()
        .any(|m| lower.contains(m));

    !(has_rate_marker || has_level_marker || has_schedule_marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(text: &str) -> RawMessage {
        RawMessage {
            id: 1,
            channel_id: 1,
            message_id: 1,
            channel_username: None,
            channel_title: None,
            date: Utc::now(),
            raw_text: text.to_string(),
            is_forwarded: false,
            is_deleted: false,
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn forwarded_posts_are_skipped_first() {
        let mut msg = raw("P5 Math tutor needed, $50/hr, Mon 5-7pm");
        msg.is_forwarded = true;
        let config = FilterConfig::default();
        assert_eq!(evaluate(&msg, &config), FilterOutcome::Skip(ErrorKind::FilteredForwarded));
    }

    #[test]
    fn empty_text_is_filtered_short() {
        let msg = raw("   ");
        let config = FilterConfig::default();
        assert_eq!(evaluate(&msg, &config), FilterOutcome::Skip(ErrorKind::FilteredShort));
    }

    #[test]
    fn compilation_post_is_skipped() {
        let text = (1..=5)
            .map(|i| format!("A{i} - P5 Math tutor needed in Bishan"))
            .collect::<Vec<_>>()
            .join("\n");
        let msg = raw(&text);
        let config = FilterConfig {
            compilation_threshold: 5,
            ..FilterConfig::default()
        };
        assert_eq!(evaluate(&msg, &config), FilterOutcome::Skip(ErrorKind::FilteredCompilation));
    }

    #[test]
    fn assignment_text_proceeds() {
        let msg = raw("Looking for P5 Math tutor in Bishan 570123, $55/hr, Mon 5-7pm");
        let config = FilterConfig::default();
        assert!(matches!(evaluate(&msg, &config), FilterOutcome::Proceed(_)));
    }

    #[test]
    fn greeting_with_no_assignment_markers_is_filtered() {
        let msg = raw("Good morning everyone, hope you all have a wonderful day ahead!");
        let config = FilterConfig::default();
        assert_eq!(
            evaluate(&msg, &config),
            FilterOutcome::Skip(ErrorKind::FilteredNonAssignment)
        );
    }
}
