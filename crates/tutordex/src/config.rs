//! Config file resolution and secret overlay.
//!
//! The TOML file holds everything safe to check into a config repo;
//! `LLM_API_KEY`, `TELEGRAM_BOT_TOKEN` and `DATABASE_URL` are read from the
//! environment instead so they never end up in that file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tutordex_protocol::Config;

pub struct ResolvedConfig {
    pub config: Config,
    pub llm_api_key: String,
    pub telegram_bot_token: String,
}

/// Resolve the config file path: `--config`, then `TUTORDEX_CONFIG`, then
/// `~/.tutordex/config.toml`.
pub fn config_path(cli_override: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_override {
        return path;
    }
    if let Ok(path) = std::env::var("TUTORDEX_CONFIG") {
        return PathBuf::from(path);
    }
    tutordex_logging::tutordex_home().join("config.toml")
}

/// Load the config file (if present — a missing file just means every field
/// takes its `Default`), then overlay secrets from the environment.
pub fn load(cli_override: Option<PathBuf>) -> Result<ResolvedConfig> {
    let path = config_path(cli_override);
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        Config::from_toml_str(&raw)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "no config file found, using defaults");
        Config::default()
    };

    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        config.database_url = database_url;
    }

    let llm_api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
    let telegram_bot_token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();

    Ok(ResolvedConfig { config, llm_api_key, telegram_bot_token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let resolved = load(Some(PathBuf::from("/nonexistent/path/config.toml"))).unwrap();
        assert_eq!(resolved.config.pipeline_version, "v1");
    }

    #[test]
    fn explicit_override_wins_over_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "pipeline_version = \"v9\"\n").unwrap();

        let resolved = load(Some(path)).unwrap();
        assert_eq!(resolved.config.pipeline_version, "v9");
    }
}
