//! Signals rollup (C6 step 5).
//!
//! Pure projections of a [`ParsedAssignment`] plus the tutor-type hits and
//! taxonomy version computed by the earlier steps — invariant I4 requires
//! these to be deterministic functions of their inputs.

use tutordex_protocol::{ParsedAssignment, Signals, TutorTypeHit};

use crate::taxonomy::{canonicalize_level, canonicalize_subject, TAXONOMY_VERSION};

/// Region buckets used by downstream matching; kept intentionally coarse.
fn region_for_mrt_or_address(parsed: &ParsedAssignment) -> Option<String> {
    let haystack = parsed
        .address
        .iter()
        .chain(parsed.nearest_mrt.iter())
        .map(|s| s.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    const CENTRAL: &[&str] = &["bishan", "toa payoh", "novena", "newton", "orchard"];
    const EAST: &[&str] = &["tampines", "bedok", "pasir ris", "changi"];
    const WEST: &[&str] = &["jurong", "clementi", "bukit batok", "boon lay"];
    const NORTH: &[&str] = &["woodlands", "yishun", "sembawang", "admiralty"];

    if CENTRAL.iter().any(|kw| haystack.contains(kw)) {
        Some("central".to_string())
    } else if EAST.iter().any(|kw| haystack.contains(kw)) {
        Some("east".to_string())
    } else if WEST.iter().any(|kw| haystack.contains(kw)) {
        Some("west".to_string())
    } else if NORTH.iter().any(|kw| haystack.contains(kw)) {
        Some("north".to_string())
    } else {
        None
    }
}

/// Derive subject/level labels from `academic_display_text`, the field the
/// LLM is asked to populate with something like `"P5 Math"`.
fn extract_level_and_subjects(display_text: &str) -> (Option<&'static str>, Vec<String>) {
    let lower = display_text.to_ascii_lowercase();
    let level_token = ["p1", "p2", "p3", "p4", "p5", "p6", "sec 1", "sec 2", "sec 3", "sec 4", "sec 5", "jc1", "jc2"]
        .iter()
        .find(|l| lower.contains(**l))
        .copied();

    let subjects: Vec<String> = ["math", "english", "science", "physics", "chemistry", "biology", "chinese"]
        .iter()
        .filter(|s| lower.contains(**s))
        .map(|s| s.to_string())
        .collect();

    (level_token, subjects)
}

pub fn compute_signals(parsed: &ParsedAssignment, tutor_types: Vec<TutorTypeHit>) -> Signals {
    let display_text = parsed.academic_display_text.clone().unwrap_or_default();
    let (level_token, subjects) = extract_level_and_subjects(&display_text);

    let mut subjects_canonical = Vec::new();
    let mut subjects_general = Vec::new();
    let mut levels = Vec::new();
    let mut specific_levels = Vec::new();

    if let Some(level) = level_token {
        let (general, specific) = canonicalize_level(level);
        if !levels.contains(&general) {
            levels.push(general.clone());
        }
        if let Some(specific) = specific {
            specific_levels.push(specific);
        }

        for subject in &subjects {
            let code = canonicalize_subject(&general, subject);
            if !subjects_canonical.contains(&code) {
                subjects_canonical.push(code);
            }
            if !subjects_general.contains(&general) {
                subjects_general.push(general.clone());
            }
        }
    }

    Signals {
        subjects_canonical,
        subjects_general,
        levels,
        specific_levels,
        region: region_for_mrt_or_address(parsed),
        tutor_types,
        rate_min: parsed.rate.min,
        rate_max: parsed.rate.max,
        canonicalization_version: TAXONOMY_VERSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutordex_protocol::RateRange;

    fn parsed(display_text: &str, address: &[&str], rate_min: Option<f64>, rate_max: Option<f64>) -> ParsedAssignment {
        ParsedAssignment {
            academic_display_text: Some(display_text.to_string()),
            address: address.iter().map(|s| s.to_string()).collect(),
            rate: RateRange {
                min: rate_min,
                max: rate_max,
                raw_text: None,
            },
            ..ParsedAssignment::default()
        }
    }

    #[test]
    fn happy_path_signals_match_spec_scenario() {
        let p = parsed("P5 Math", &["Bishan"], Some(55.0), Some(55.0));
        let signals = compute_signals(&p, Vec::new());
        assert_eq!(signals.subjects_canonical, vec!["PRI.MATH".to_string()]);
        assert_eq!(signals.levels, vec!["Primary".to_string()]);
        assert_eq!(signals.specific_levels, vec!["Primary 5".to_string()]);
        assert_eq!(signals.region, Some("central".to_string()));
        assert_eq!(signals.rate_min, Some(55.0));
        assert_eq!(signals.rate_max, Some(55.0));
    }

    #[test]
    fn is_a_pure_function_of_its_inputs() {
        let p = parsed("P6 Science", &["Tampines"], None, None);
        let a = compute_signals(&p, Vec::new());
        let b = compute_signals(&p, Vec::new());
        assert_eq!(a.subjects_canonical, b.subjects_canonical);
        assert_eq!(a.region, b.region);
    }
}
