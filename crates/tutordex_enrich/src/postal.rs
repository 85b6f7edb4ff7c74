//! Postal-code fill (C6 step 1).
//!
//! Only fills `postal_code[]` when the LLM returned none — regex never
//! overrides an extraction the model already produced.

use regex::Regex;
use std::sync::OnceLock;

fn six_digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{6}\b").unwrap())
}

/// Singapore postal codes are six digits; sector 00 doesn't exist and a
/// run of the same digit six times is essentially always a phone/price
/// artifact rather than a real postal code.
fn is_plausible_sg_postal(code: &str) -> bool {
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if code.starts_with("00") {
        return false;
    }
    !code.chars().all(|c| c == code.chars().next().unwrap())
}

/// Fill `postal_code` from `raw_text` when `existing` is empty. Returns
/// `None` when nothing plausible was found, so the caller can record
/// provenance (`meta.enrichment.postal_source`).
pub fn fill_postal_codes(existing: &[String], raw_text: &str) -> Option<Vec<String>> {
    if !existing.is_empty() {
        return None;
    }

    let found: Vec<String> = six_digit_re()
        .find_iter(raw_text)
        .map(|m| m.as_str().to_string())
        .filter(|code| is_plausible_sg_postal(code))
        .collect();

    if found.is_empty() {
        None
    } else {
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_when_llm_returned_none() {
        let result = fill_postal_codes(&[], "Looking for a tutor near 570123, central area");
        assert_eq!(result, Some(vec!["570123".to_string()]));
    }

    #[test]
    fn never_overrides_existing_llm_output() {
        let existing = vec!["123456".to_string()];
        let result = fill_postal_codes(&existing, "nearby 570123");
        assert_eq!(result, None);
    }

    #[test]
    fn rejects_implausible_repeated_digit_codes() {
        let result = fill_postal_codes(&[], "call 999999 now");
        assert_eq!(result, None);
    }

    #[test]
    fn absent_from_both_remains_empty() {
        let result = fill_postal_codes(&[], "no postal code mentioned here at all");
        assert_eq!(result, None);
    }
}
