//! Rule-based tutor-type extraction (C6 step 3).

use tutordex_protocol::TutorTypeHit;

struct Rule {
    canonical: &'static str,
    keywords: &'static [&'static str],
    confidence: f64,
}

const RULES: &[Rule] = &[
    Rule {
        canonical: "ex_moe",
        keywords: &["ex-moe", "ex moe", "former moe", "retired moe"],
        confidence: 0.95,
    },
    Rule {
        canonical: "moe",
        keywords: &["moe teacher", "current moe", "full-time moe"],
        confidence: 0.9,
    },
    Rule {
        canonical: "full_time",
        keywords: &["full-time tutor", "full time tutor", "ft tutor"],
        confidence: 0.8,
    },
    Rule {
        canonical: "part_time",
        keywords: &["part-time tutor", "part time tutor", "pt tutor"],
        confidence: 0.8,
    },
    Rule {
        canonical: "undergraduate",
        keywords: &["undergraduate", "university student", "uni student"],
        confidence: 0.7,
    },
];

/// Scan `text` against the keyword rules, emitting one hit per matched
/// canonical type with the literal phrase that triggered it.
pub fn extract_tutor_types(text: &str) -> Vec<TutorTypeHit> {
    let lower = text.to_ascii_lowercase();
    let mut hits = Vec::new();

    for rule in RULES {
        if let Some(keyword) = rule.keywords.iter().find(|kw| lower.contains(**kw)) {
            hits.push(TutorTypeHit {
                canonical: rule.canonical.to_string(),
                original: keyword.to_string(),
                confidence: rule.confidence,
            });
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ex_moe_with_high_confidence() {
        let hits = extract_tutor_types("Looking for an ex-MOE tutor for P5 Math");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].canonical, "ex_moe");
        assert!(hits[0].confidence > 0.9);
    }

    #[test]
    fn can_match_multiple_rules() {
        let hits = extract_tutor_types("Full-time tutor preferred, university student also ok");
        let canonicals: Vec<_> = hits.iter().map(|h| h.canonical.as_str()).collect();
        assert!(canonicals.contains(&"full_time"));
        assert!(canonicals.contains(&"undergraduate"));
    }

    #[test]
    fn no_match_yields_empty() {
        let hits = extract_tutor_types("Any tutor welcome");
        assert!(hits.is_empty());
    }
}
