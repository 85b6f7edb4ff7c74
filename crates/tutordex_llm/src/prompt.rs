//! Prompt assembly.
//!
//! System prompt plus an example set keyed by `(channel, agency_registry)`
//! with a `"general"` fallback, stamped with a content fingerprint for
//! provenance.

use tutordex_protocol::content_fingerprint;

pub const GENERAL_EXAMPLE_SET: &str = "general";

#[derive(Debug, Clone)]
pub struct ExampleSet {
    pub key: String,
    pub examples: String,
}

pub struct PromptLibrary {
    system_prompt: String,
    example_sets: Vec<(String, String)>,
}

impl PromptLibrary {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            example_sets: Vec::new(),
        }
    }

    pub fn with_example_set(mut self, key: impl Into<String>, examples: impl Into<String>) -> Self {
        self.example_sets.push((key.into(), examples.into()));
        self
    }

    /// Resolve the example set for a channel/agency pair, falling back to
    /// `"general"` when no specific set has been registered.
    fn resolve_examples(&self, registry_key: &str) -> &str {
        self.example_sets
            .iter()
            .find(|(k, _)| k == registry_key)
            .or_else(|| self.example_sets.iter().find(|(k, _)| k == GENERAL_EXAMPLE_SET))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Assemble the full prompt and a fingerprint of (system prompt +
    /// resolved examples) for provenance.
    pub fn build(&self, channel: &str, agency_registry: Option<&str>, raw_body: &str) -> AssembledPrompt {
        let registry_key = agency_registry.unwrap_or(channel);
        let examples = self.resolve_examples(registry_key);
        let fingerprint_input = format!("{}\n{}", self.system_prompt, examples);

        AssembledPrompt {
            system: self.system_prompt.clone(),
            user: format!("{examples}\n\n---\n\n{raw_body}"),
            prompt_fingerprint: content_fingerprint(&fingerprint_input),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub system: String,
    pub user: String,
    pub prompt_fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_general_example_set() {
        let lib = PromptLibrary::new("extract assignments")
            .with_example_set(GENERAL_EXAMPLE_SET, "general examples here");

        let prompt = lib.build("@unknown_channel", None, "raw body");
        assert!(prompt.user.contains("general examples here"));
    }

    #[test]
    fn prefers_registry_specific_example_set() {
        let lib = PromptLibrary::new("extract assignments")
            .with_example_set(GENERAL_EXAMPLE_SET, "general")
            .with_example_set("agency_x", "agency x specific examples");

        let prompt = lib.build("@channel", Some("agency_x"), "raw body");
        assert!(prompt.user.contains("agency x specific examples"));
    }

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let lib = PromptLibrary::new("extract assignments")
            .with_example_set(GENERAL_EXAMPLE_SET, "general");
        let a = lib.build("@c", None, "body one");
        let b = lib.build("@c", None, "body two");
        assert_eq!(a.prompt_fingerprint, b.prompt_fingerprint);
    }
}
