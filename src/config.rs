//! # Configuration Module
//!
//! Loads runtime configuration from environment variables, after `dotenvy`
//! has merged the local `.env` file into the process environment.
//!
//! The four service settings are optional at load time. Each client checks
//! for the ones it needs when it is built, so `relearnweb settings show`
//! works on a half-configured machine.

use anyhow::{Context, Result};
use std::env;
use std::path::Path;

use crate::error::ResearchError;

/// Base URL of the OpenAI-compatible chat completions API.
pub const LLM_ENDPOINT: &str = "LLM_ENDPOINT";
/// API key for the text generation endpoint.
pub const LLM_API_KEY: &str = "LLM_API_KEY";
/// Model identifier sent with every completion request.
pub const LLM_MODEL_ID: &str = "LLM_MODEL_ID";
/// API key for Firecrawl search.
pub const FIRECRAWL_API_KEY: &str = "FIRECRAWL_API_KEY";

/// The settings persisted in the dotenv file, in display order.
pub const SETTING_KEYS: [&str; 4] = [LLM_ENDPOINT, LLM_API_KEY, LLM_MODEL_ID, FIRECRAWL_API_KEY];

/// Upper bound for `SEARCH_TIMEOUT_MS` (five minutes)
pub const MAX_SEARCH_TIMEOUT_MS: u64 = 300_000;

/// Main configuration for a research run.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model_id: Option<String>,
    pub firecrawl_api_key: Option<String>,

    /// Sampling temperature for every completion (0.0 - 2.0)
    pub temperature: f32,

    /// Whether completions that allow it are requested as a stream
    pub streaming: bool,

    /// Per-request timeout for the chat completions endpoint
    pub request_timeout_secs: u64,

    /// Crawl timeout passed to Firecrawl, in milliseconds
    pub search_timeout_ms: u64,

    /// Maximum number of documents per search
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_endpoint: None,
            llm_api_key: None,
            llm_model_id: None,
            firecrawl_api_key: None,
            temperature: 0.7,
            streaming: true,
            request_timeout_secs: 120,
            search_timeout_ms: 15_000,
            search_limit: 5,
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `env_file` names the dotenv file to merge first; a missing file is
    /// not an error. Variables already set in the process win over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                if path.exists() {
                    dotenvy::from_path(path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                }
            }
            None => {
                let _ = dotenvy::dotenv();
            }
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Config {
            llm_endpoint: non_empty(LLM_ENDPOINT),
            llm_api_key: non_empty(LLM_API_KEY),
            llm_model_id: non_empty(LLM_MODEL_ID),
            firecrawl_api_key: non_empty(FIRECRAWL_API_KEY),
            ..Config::default()
        };

        if let Some(val) = non_empty("TEMPERATURE") {
            config.temperature = val
                .trim()
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.7)")?;
        }

        if let Some(val) = non_empty("LLM_STREAMING") {
            config.streaming = parse_bool(&val)
                .with_context(|| format!("LLM_STREAMING must be true or false, got: {}", val))?;
        }

        if let Some(val) = non_empty("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = val
                .trim()
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?;
        }

        if let Some(val) = non_empty("SEARCH_TIMEOUT_MS") {
            config.search_timeout_ms = val
                .trim()
                .parse()
                .context("SEARCH_TIMEOUT_MS must be a positive integer")?;
        }

        if let Some(val) = non_empty("SEARCH_LIMIT") {
            config.search_limit = val
                .trim()
                .parse()
                .context("SEARCH_LIMIT must be a positive integer")?;
        }

        Ok(config)
    }

    /// Check value ranges. Missing service settings are reported by the
    /// clients instead, so they are not checked here.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ResearchError::Configuration(format!(
                "TEMPERATURE must be between 0.0 and 2.0, got: {}",
                self.temperature
            )));
        }

        if self.search_limit == 0 {
            return Err(ResearchError::Configuration(
                "SEARCH_LIMIT must be at least 1".to_string(),
            ));
        }

        if self.search_timeout_ms == 0 || self.request_timeout_secs == 0 {
            return Err(ResearchError::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        if self.search_timeout_ms > MAX_SEARCH_TIMEOUT_MS {
            return Err(ResearchError::Configuration(format!(
                "SEARCH_TIMEOUT_MS must be at most {}, got: {}",
                MAX_SEARCH_TIMEOUT_MS, self.search_timeout_ms
            )));
        }

        Ok(())
    }
}

/// Return the value of a required setting or a configuration error naming it.
pub(crate) fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, ResearchError> {
    value
        .as_deref()
        .ok_or_else(|| ResearchError::Configuration(format!("{} is not set", key)))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.llm_endpoint.is_none());
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.streaming);
        assert_eq!(config.search_timeout_ms, 15_000);
        assert_eq!(config.search_limit, 5);
    }

    #[test]
    fn test_from_lookup_reads_settings() {
        let config = Config::from_lookup(lookup(&[
            (LLM_ENDPOINT, "https://api.example.com/v1"),
            (LLM_API_KEY, "sk-test"),
            (LLM_MODEL_ID, "gpt-4o-mini"),
            (FIRECRAWL_API_KEY, "fc-test"),
            ("SEARCH_LIMIT", "3"),
            ("LLM_STREAMING", "false"),
        ]))
        .unwrap();

        assert_eq!(config.llm_endpoint.as_deref(), Some("https://api.example.com/v1"));
        assert_eq!(config.llm_model_id.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.firecrawl_api_key.as_deref(), Some("fc-test"));
        assert_eq!(config.search_limit, 3);
        assert!(!config.streaming);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = Config::from_lookup(lookup(&[(LLM_API_KEY, "  ")])).unwrap();
        assert!(config.llm_api_key.is_none());
        assert!(require(&config.llm_api_key, LLM_API_KEY).is_err());
    }

    #[test]
    fn test_invalid_number_is_error() {
        assert!(Config::from_lookup(lookup(&[("TEMPERATURE", "hot")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LLM_STREAMING", "maybe")])).is_err());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_temperature() {
        let config = Config {
            temperature: 3.0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ResearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_config_validation_invalid_search_limit() {
        let config = Config {
            search_limit: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_search_timeout_cap() {
        let config =
            Config::from_lookup(lookup(&[("SEARCH_TIMEOUT_MS", "18446744073709551615")])).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ResearchError::Configuration(ref m)) if m.contains("SEARCH_TIMEOUT_MS")
        ));

        let config = Config {
            search_timeout_ms: MAX_SEARCH_TIMEOUT_MS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}
