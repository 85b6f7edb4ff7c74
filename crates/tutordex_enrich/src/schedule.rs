//! Time-availability grammar parser (C6 step 2).
//!
//! Converts free-text schedule descriptions into a structured
//! `TimeAvailability`, overwriting whatever the LLM returned — the grammar
//! parse is authoritative over the model's guess.

use regex::Regex;
use std::sync::OnceLock;
use tutordex_protocol::{TimeAvailability, TimeSlot, Weekday};

fn day_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(mon|tue|wed|thu|fri|sat|sun)\w*\s+(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*[-–to]+\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)",
        )
        .unwrap()
    })
}

fn normalize_time(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    let is_pm = lower.ends_with("pm");
    let is_am = lower.ends_with("am");
    let digits = lower.trim_end_matches("pm").trim_end_matches("am").trim();

    let (hour_part, minute_part) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None => (digits, "00"),
    };
    let mut hour: u32 = hour_part.parse().unwrap_or(0);
    if is_pm && hour < 12 {
        hour += 12;
    }
    if is_am && hour == 12 {
        hour = 0;
    }
    format!("{:02}:{:02}", hour, minute_part.parse::<u32>().unwrap_or(0))
}

/// Parse explicit day/time-range mentions; anything left over that still
/// looks schedule-related but didn't match the grammar is preserved
/// verbatim as `note` for a human to disambiguate later, rather than
/// silently dropped.
pub fn parse_schedule(raw_text: &str) -> TimeAvailability {
    let mut explicit = Vec::new();

    for caps in day_range_re().captures_iter(raw_text) {
        let Some(day) = Weekday::from_prefix(&caps[1]) else {
            continue;
        };
        explicit.push(TimeSlot {
            day,
            start: normalize_time(&caps[2]),
            end: normalize_time(&caps[3]),
        });
    }

    let note = if explicit.is_empty() && contains_schedule_language(raw_text) {
        Some("unstructured schedule mention; needs manual review".to_string())
    } else {
        None
    };

    TimeAvailability {
        explicit,
        estimated: Vec::new(),
        note,
    }
}

fn contains_schedule_language(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ["weekday", "weekend", "flexible timing", "anytime", "to be discussed"]
        .iter()
        .any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_day_range() {
        let result = parse_schedule("Available Mon 5pm-7pm for lessons");
        assert_eq!(result.explicit.len(), 1);
        assert_eq!(result.explicit[0].day, Weekday::Mon);
        assert_eq!(result.explicit[0].start, "17:00");
        assert_eq!(result.explicit[0].end, "19:00");
    }

    #[test]
    fn parses_multiple_day_ranges() {
        let result = parse_schedule("Mon 5pm-7pm and Wed 6pm-8pm");
        assert_eq!(result.explicit.len(), 2);
        assert_eq!(result.explicit[1].day, Weekday::Wed);
    }

    #[test]
    fn unstructured_mention_becomes_a_note() {
        let result = parse_schedule("Timing is flexible timing, to be discussed");
        assert!(result.explicit.is_empty());
        assert!(result.note.is_some());
    }

    #[test]
    fn no_schedule_language_yields_empty_availability() {
        let result = parse_schedule("Looking for a tutor, rate negotiable");
        assert!(result.explicit.is_empty());
        assert!(result.note.is_none());
    }
}
