//! HTML rendering and length truncation for outbound Telegram messages:
//! HTML parse mode, message length capped at 4096 chars, truncation with a
//! stable "…" marker.

use tutordex_protocol::Assignment;

pub const TELEGRAM_MAX_CHARS: usize = 4096;
const TRUNCATION_MARKER: &str = "…";

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render an assignment as an HTML message body. Kept deliberately plain —
/// bold subject line, then the address/schedule/rate lines the matcher and
/// broadcast channel both care about.
pub fn render_assignment(assignment: &Assignment) -> String {
    let parsed = &assignment.parsed;
    let mut lines = Vec::new();

    let subject_line = parsed
        .academic_display_text
        .clone()
        .unwrap_or_else(|| "Tuition assignment".to_string());
    lines.push(format!("<b>{}</b>", escape_html(&subject_line)));

    if !assignment.signals.levels.is_empty() {
        lines.push(format!("Level: {}", escape_html(&assignment.signals.levels.join(", "))));
    }
    if !parsed.address.is_empty() {
        lines.push(format!("Location: {}", escape_html(&parsed.address.join(", "))));
    }
    if let (Some(min), Some(max)) = (assignment.signals.rate_min, assignment.signals.rate_max) {
        lines.push(format!("Rate: ${min:.0}-${max:.0}/h"));
    }
    if let Some(remarks) = &parsed.additional_remarks {
        lines.push(escape_html(remarks));
    }

    truncate_to_telegram_limit(&lines.join("\n"))
}

/// Truncate on a UTF-8 char boundary so the rendered text plus the marker
/// never exceeds [`TELEGRAM_MAX_CHARS`].
pub fn truncate_to_telegram_limit(text: &str) -> String {
    if text.chars().count() <= TELEGRAM_MAX_CHARS {
        return text.to_string();
    }

    let budget = TELEGRAM_MAX_CHARS - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = text.chars().take(budget).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_unchanged() {
        assert_eq!(truncate_to_telegram_limit("hello"), "hello");
    }

    #[test]
    fn long_text_is_truncated_with_stable_marker_within_limit() {
        let text: String = "a".repeat(5000);
        let truncated = truncate_to_telegram_limit(&text);
        assert_eq!(truncated.chars().count(), TELEGRAM_MAX_CHARS);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_respects_multibyte_char_boundaries() {
        let text: String = "é".repeat(5000);
        let truncated = truncate_to_telegram_limit(&text);
        assert_eq!(truncated.chars().count(), TELEGRAM_MAX_CHARS);
    }

    #[test]
    fn html_special_characters_are_escaped() {
        let mut assignment = sample_assignment();
        assignment.parsed.academic_display_text = Some("P5 <Math & Science>".to_string());
        let rendered = render_assignment(&assignment);
        assert!(rendered.contains("&lt;Math &amp; Science&gt;"));
    }

    fn sample_assignment() -> Assignment {
        use chrono::Utc;
        use tutordex_protocol::{AssignmentStatus, FreshnessTier, ParsedAssignment, Signals};

        Assignment {
            channel_id: 1,
            message_id: 1,
            parsed: ParsedAssignment::default(),
            signals: Signals::default(),
            postal_lat: None,
            postal_lon: None,
            status: AssignmentStatus::Open,
            freshness_tier: FreshnessTier::Green,
            published_at: Utc::now(),
            updated_at: Utc::now(),
            duplicate_group_id: None,
            is_primary_in_group: true,
            duplicate_confidence_score: None,
        }
    }
}
