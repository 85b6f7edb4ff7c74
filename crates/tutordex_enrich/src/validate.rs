//! Validator / Canonicalizer (C7).
//!
//! `RawParsedAssignment` is the weakly-typed intermediate matching whatever
//! shape the LLM plausibly emits (loose `Value` fields); `validate` turns it
//! into the strongly-typed [`ParsedAssignment`], never guessing — unknown or
//! malformed fields become `None`/dropped per invariant I5.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tutordex_protocol::{LearningMode, LearningModeField, ParsedAssignment, RateRange, ScheduleSlot, Weekday};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawParsedAssignment {
    pub assignment_code: Option<Value>,
    pub academic_display_text: Option<Value>,
    pub learning_mode: Option<Value>,
    pub address: Option<Value>,
    pub postal_code: Option<Value>,
    pub nearest_mrt: Option<Value>,
    pub lesson_schedule: Option<Value>,
    pub start_date: Option<Value>,
    pub rate: Option<Value>,
    pub additional_remarks: Option<Value>,
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_string())
}

fn as_string_array(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_string).collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn validate_learning_mode(value: Option<&Value>) -> LearningModeField {
    let raw_text = value.and_then(as_string);
    let mode = raw_text
        .as_deref()
        .and_then(|s| s.parse::<LearningMode>().ok())
        .unwrap_or(LearningMode::Unknown);
    LearningModeField { mode, raw_text }
}

fn validate_rate(value: Option<&Value>) -> RateRange {
    let Some(Value::Object(map)) = value else {
        return RateRange::default();
    };

    let min = map.get("min").and_then(Value::as_f64);
    let max = map.get("max").and_then(Value::as_f64);
    let raw_text = map.get("raw_text").and_then(as_string);

    let (min, max) = match (min, max) {
        (Some(min), Some(max)) if min >= 0.0 && max >= 0.0 && min <= max => (Some(min), Some(max)),
        (Some(min), None) if min >= 0.0 => (Some(min), None),
        (None, Some(max)) if max >= 0.0 => (None, Some(max)),
        _ => (None, None),
    };

    RateRange { min, max, raw_text }
}

fn validate_schedule_slot(value: &Value) -> Option<ScheduleSlot> {
    let Value::Object(map) = value else { return None };
    let day = map
        .get("day")
        .and_then(Value::as_str)
        .and_then(Weekday::from_prefix);
    let start = map.get("start").and_then(as_string);
    let end = map.get("end").and_then(as_string);
    let note = map.get("note").and_then(as_string);

    if day.is_none() && start.is_none() && end.is_none() && note.is_none() {
        return None;
    }
    Some(ScheduleSlot { day, start, end, note })
}

fn validate_lesson_schedule(value: Option<&Value>) -> Vec<ScheduleSlot> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(validate_schedule_slot).collect(),
        _ => Vec::new(),
    }
}

fn validate_start_date(value: Option<&Value>) -> Option<NaiveDate> {
    value
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Hard, type-directed validation. Every field either parses into the
/// canonical shape or is dropped — never invented.
pub fn validate(raw: RawParsedAssignment) -> ParsedAssignment {
    ParsedAssignment {
        assignment_code: raw.assignment_code.as_ref().and_then(as_string),
        academic_display_text: raw.academic_display_text.as_ref().and_then(as_string),
        learning_mode: validate_learning_mode(raw.learning_mode.as_ref()),
        address: raw.address.as_ref().map(as_string_array).unwrap_or_default(),
        postal_code: raw.postal_code.as_ref().map(as_string_array).unwrap_or_default(),
        nearest_mrt: raw.nearest_mrt.as_ref().map(as_string_array).unwrap_or_default(),
        lesson_schedule: validate_lesson_schedule(raw.lesson_schedule.as_ref()),
        start_date: validate_start_date(raw.start_date.as_ref()),
        time_availability: Default::default(),
        rate: validate_rate(raw.rate.as_ref()),
        additional_remarks: raw.additional_remarks.as_ref().and_then(as_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrong_typed_field_becomes_none_not_a_panic() {
        let raw = RawParsedAssignment {
            assignment_code: Some(json!(12345)),
            ..Default::default()
        };
        let parsed = validate(raw);
        assert_eq!(parsed.assignment_code, None);
    }

    #[test]
    fn rate_with_min_greater_than_max_is_dropped() {
        let raw = RawParsedAssignment {
            rate: Some(json!({"min": 80.0, "max": 50.0})),
            ..Default::default()
        };
        let parsed = validate(raw);
        assert_eq!(parsed.rate.min, None);
        assert_eq!(parsed.rate.max, None);
    }

    #[test]
    fn valid_rate_range_passes_through() {
        let raw = RawParsedAssignment {
            rate: Some(json!({"min": 50.0, "max": 60.0})),
            ..Default::default()
        };
        let parsed = validate(raw);
        assert_eq!(parsed.rate.min, Some(50.0));
        assert_eq!(parsed.rate.max, Some(60.0));
    }

    #[test]
    fn unparseable_start_date_is_dropped() {
        let raw = RawParsedAssignment {
            start_date: Some(json!("not-a-date")),
            ..Default::default()
        };
        let parsed = validate(raw);
        assert_eq!(parsed.start_date, None);
    }

    #[test]
    fn unknown_learning_mode_text_falls_back_to_unknown_enum() {
        let raw = RawParsedAssignment {
            learning_mode: Some(json!("telepathy")),
            ..Default::default()
        };
        let parsed = validate(raw);
        assert_eq!(parsed.learning_mode.mode, LearningMode::Unknown);
        assert_eq!(parsed.learning_mode.raw_text, Some("telepathy".to_string()));
    }
}
