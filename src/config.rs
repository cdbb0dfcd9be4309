//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    /// Fallback model for OpenRouter (used when primary model fails).
    #[serde(default)]
    pub fallback_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            port = 8090

            [llm]
            provider = "anthropic"
            model = "claude-3-sonnet"
            api_key_env = "ANTHROPIC_API_KEY"
            max_tokens = 1024
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.port, 8090);
        assert_eq!(cfg.llm.provider, "anthropic");
        assert_eq!(cfg.llm.model, "claude-3-sonnet");
        assert!(cfg.llm.fallback_model.is_none());
    }

    #[test]
    fn test_parse_config_with_fallback_model() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 8090

            [llm]
            provider = "openrouter"
            model = "anthropic/claude-sonnet-4"
            api_key_env = "OPENROUTER_API_KEY"
            max_tokens = 512
            fallback_model = "x-ai/grok-4.1-fast"
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.fallback_model.as_deref(), Some("x-ai/grok-4.1-fast"));
    }

    #[test]
    fn test_load_config_file() {
        // This test requires config.toml to be in the working directory.
        // If it isn't found, that's acceptable in some test environments.
        if let Ok(cfg) = AppConfig::load("config.toml") {
            assert!(!cfg.llm.model.is_empty());
            assert!(cfg.llm.max_tokens > 0);
            assert!(cfg.server.port > 0);
        }
    }

    #[test]
    fn test_resolve_env_missing() {
        assert!(AppConfig::resolve_env("EDGECOACH_DOES_NOT_EXIST_XYZ").is_err());
    }
}
