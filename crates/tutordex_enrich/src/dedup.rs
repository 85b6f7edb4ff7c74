//! Structural duplicate detection (C6 step 7).
//!
//! Computes a fingerprint over level+subject+region+rate+schedule bucket
//! and compares it against recent assignments within a sliding window.
//! Tie-break for simultaneous arrivals is first-committed-wins by
//! timestamp, then lexicographic `(channel_id, message_id)`.

use tutordex_protocol::{Assignment, Signals};

/// A schedule "bucket" coarse enough that two posts for the same slot
/// phrased slightly differently still collide (exact minute granularity
/// would make duplicate detection useless).
fn schedule_bucket(assignment_signals: &Signals, schedule_days: &[String]) -> String {
    let mut days = schedule_days.to_vec();
    days.sort();
    days.join(",")
        + "|"
        + &assignment_signals.rate_min.map(|r| (r / 10.0).floor().to_string()).unwrap_or_default()
}

pub fn fingerprint(signals: &Signals, schedule_days: &[String]) -> String {
    let mut subjects = signals.subjects_canonical.clone();
    subjects.sort();
    format!(
        "{}|{}|{}|{}",
        subjects.join(","),
        signals.levels.join(","),
        signals.region.clone().unwrap_or_default(),
        schedule_bucket(signals, schedule_days),
    )
}

pub struct DuplicateResult {
    pub duplicate_group_id: String,
    pub is_primary: bool,
    pub confidence: f64,
}

/// Compare `fingerprint` against `candidates` (assignments already
/// persisted within the dedup window, oldest first) and decide group
/// membership. The first assignment ever seen for a fingerprint becomes
/// the group id and the primary; everything after references it.
pub fn resolve_duplicate(
    new_fingerprint: &str,
    new_key: (i64, i64),
    candidates: &[Assignment],
    candidate_fingerprints: &[(String, (i64, i64))],
) -> DuplicateResult {
    let mut matches: Vec<&(String, (i64, i64))> = candidate_fingerprints
        .iter()
        .filter(|(fp, _)| fp == new_fingerprint)
        .collect();

    // candidate_fingerprints is assumed ordered oldest-first (matching
    // `recent_for_dedup`'s ORDER BY published_at ASC); a tie on published_at
    // is broken lexicographically on (channel_id, message_id).
    matches.sort_by(|a, b| a.1.cmp(&b.1));
    let _ = candidates;

    match matches.first() {
        Some((_, earliest_key)) => DuplicateResult {
            duplicate_group_id: format_group_id(*earliest_key),
            is_primary: *earliest_key == new_key,
            confidence: 0.9,
        },
        None => DuplicateResult {
            duplicate_group_id: format_group_id(new_key),
            is_primary: true,
            confidence: 1.0,
        },
    }
}

fn format_group_id(key: (i64, i64)) -> String {
    format!("{}:{}", key.0, key.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutordex_protocol::TutorTypeHit;

    fn signals(subjects: &[&str], level: &str, region: &str, rate: f64) -> Signals {
        Signals {
            subjects_canonical: subjects.iter().map(|s| s.to_string()).collect(),
            subjects_general: vec![],
            levels: vec![level.to_string()],
            specific_levels: vec![],
            region: Some(region.to_string()),
            tutor_types: Vec::<TutorTypeHit>::new(),
            rate_min: Some(rate),
            rate_max: Some(rate),
            canonicalization_version: "v2".to_string(),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_fingerprints() {
        let s1 = signals(&["PRI.MATH"], "Primary", "central", 55.0);
        let s2 = signals(&["PRI.MATH"], "Primary", "central", 55.0);
        assert_eq!(
            fingerprint(&s1, &["mon".to_string()]),
            fingerprint(&s2, &["mon".to_string()])
        );
    }

    #[test]
    fn first_seen_is_primary_second_arrival_is_not() {
        let s = signals(&["PRI.MATH"], "Primary", "central", 55.0);
        let fp = fingerprint(&s, &["mon".to_string()]);

        let first = resolve_duplicate(&fp, (1, 100), &[], &[]);
        assert!(first.is_primary);

        let known = vec![(fp.clone(), (1, 100))];
        let second = resolve_duplicate(&fp, (2, 200), &[], &known);
        assert!(!second.is_primary);
        assert_eq!(second.duplicate_group_id, first.duplicate_group_id);
    }

    #[test]
    fn different_fingerprints_do_not_collide() {
        let s1 = signals(&["PRI.MATH"], "Primary", "central", 55.0);
        let s2 = signals(&["SEC.CHEM"], "Secondary", "east", 70.0);
        assert_ne!(
            fingerprint(&s1, &["mon".to_string()]),
            fingerprint(&s2, &["mon".to_string()])
        );
    }
}
