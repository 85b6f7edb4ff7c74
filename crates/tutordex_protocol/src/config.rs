//! Configuration surface recognized by both binaries.
//!
//! Parsed from a single TOML file with safe defaults for every field,
//! matching `casparian_db::DbConfig`'s builder style. Secrets
//! (`LLM_API_KEY`, `TELEGRAM_BOT_TOKEN`, `DATABASE_URL`) are read from the
//! environment rather than the file so they never end up checked into a
//! config repo.

use serde::{Deserialize, Serialize};

fn default_pipeline_version() -> String {
    "v1".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stamped on all jobs; changing it forces reprocessing of historical
    /// raw rows.
    #[serde(default = "default_pipeline_version")]
    pub pipeline_version: String,
    pub database_url: String,
    pub channels: Vec<String>,
    pub llm: LlmConfig,
    pub filter: FilterConfig,
    pub enrichment: EnrichmentConfig,
    pub orchestrator: OrchestratorConfig,
    pub delivery: DeliveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline_version: default_pipeline_version(),
            database_url: "sqlite://tutordex.db".to_string(),
            channels: Vec::new(),
            llm: LlmConfig::default(),
            filter: FilterConfig::default(),
            enrichment: EnrichmentConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Backfill runs disable broadcast/DMs regardless of the configured flag.
    pub fn delivery_enabled_for(&self, is_backfill: bool) -> DeliveryConfig {
        if is_backfill {
            DeliveryConfig {
                broadcast_enabled: false,
                dms_enabled: false,
                ..self.delivery.clone()
            }
        } else {
            self.delivery.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub circuit_threshold: u32,
    pub circuit_cooldown_s: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_ms: 30_000,
            max_tokens: 1024,
            temperature: 0.0,
            circuit_threshold: 5,
            circuit_cooldown_s: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_chars: usize,
    pub compilation_threshold: usize,
    pub blocklist_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_chars: 20,
            compilation_threshold: 5,
            blocklist_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub geocoding_enabled: bool,
    pub geocoding_url: String,
    pub dedup_window_hours: i64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            geocoding_enabled: false,
            geocoding_url: "https://nominatim.openstreetmap.org/search".to_string(),
            dedup_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub claim_batch: usize,
    pub idle_max_s: u64,
    pub stale_after_s: u64,
    pub stale_sweep_s: u64,
    pub shutdown_grace_s: u64,
    pub max_attempts: i32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            claim_batch: 8,
            idle_max_s: 10,
            stale_after_s: 600,
            stale_sweep_s: 30,
            shutdown_grace_s: 20,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub broadcast_enabled: bool,
    #[serde(default = "default_true")]
    pub dms_enabled: bool,
    pub broadcast_channel: String,
    pub min_match_score: f64,
    pub matcher_url: String,
    pub jsonl_fallback_path: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            broadcast_enabled: true,
            dms_enabled: true,
            broadcast_channel: String::new(),
            min_match_score: 0.5,
            matcher_url: "http://localhost:8090".to_string(),
            jsonl_fallback_path: "delivery_failures.jsonl".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let cfg = Config::default();
        assert_eq!(cfg.pipeline_version, "v1");
        assert!(cfg.orchestrator.workers > 0);
        assert!(cfg.delivery.broadcast_enabled);
    }

    #[test]
    fn backfill_always_disables_delivery() {
        let cfg = Config::default();
        let delivery = cfg.delivery_enabled_for(true);
        assert!(!delivery.broadcast_enabled);
        assert!(!delivery.dms_enabled);
    }

    #[test]
    fn parses_partial_toml_with_defaults_filled_in() {
        let toml_str = r#"
            pipeline_version = "v2"
            database_url = "sqlite://test.db"
            channels = ["@tutoragency1"]

            [llm]
            model = "gpt-4o"
        "#;
        let cfg = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(cfg.pipeline_version, "v2");
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.llm.timeout_ms, 30_000);
        assert_eq!(cfg.channels, vec!["@tutoragency1".to_string()]);
    }
}
