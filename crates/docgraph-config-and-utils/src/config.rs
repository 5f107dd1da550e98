//! Configuration management for the engine.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default upper bound on concurrent store fetches within one resolution pass.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

/// Default number of parsed selector strings kept in memory.
pub const DEFAULT_SELECTOR_CACHE_CAPACITY: usize = 256;

/// Default capacity of the outbound notification queue.
pub const DEFAULT_PUBLISH_QUEUE_CAPACITY: usize = 1024;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" | "jsonl" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Maximum number of store calls in flight during a single query.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Number of parsed selector strings memoized by the query engine.
    #[serde(default = "default_selector_cache_capacity")]
    pub selector_cache_capacity: usize,
    /// Capacity of the queue feeding the pub/sub worker.
    #[serde(default = "default_publish_queue_capacity")]
    pub publish_queue_capacity: usize,
    /// Redis URL used for change notifications (optional).
    #[serde(default)]
    pub redis_url: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_max_concurrent_fetches() -> usize {
    DEFAULT_MAX_CONCURRENT_FETCHES
}

fn default_selector_cache_capacity() -> usize {
    DEFAULT_SELECTOR_CACHE_CAPACITY
}

fn default_publish_queue_capacity() -> usize {
    DEFAULT_PUBLISH_QUEUE_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            selector_cache_capacity: DEFAULT_SELECTOR_CACHE_CAPACITY,
            publish_queue_capacity: DEFAULT_PUBLISH_QUEUE_CAPACITY,
            redis_url: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from a file if it exists, falling back to defaults.
    /// Environment variables are applied on top in both cases.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(CoreError::Config(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.publish_queue_capacity == 0 {
            return Err(CoreError::Config(
                "publish_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Override configuration from process environment variables.
    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Override configuration from an arbitrary variable lookup.
    ///
    /// Unparseable numeric values are ignored and the current value is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("DOCGRAPH_LOG_LEVEL").and_then(non_empty) {
            self.log_level = level;
        }
        if let Some(format) = lookup("DOCGRAPH_LOG_FORMAT").and_then(|raw| LogFormat::parse(&raw)) {
            self.log_format = format;
        }
        if let Some(url) = lookup("DOCGRAPH_REDIS_URL").and_then(non_empty) {
            self.redis_url = Some(url);
        }
        if let Some(limit) = lookup("DOCGRAPH_MAX_CONCURRENT_FETCHES")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
        {
            self.max_concurrent_fetches = limit;
        }
    }
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.max_concurrent_fetches, DEFAULT_MAX_CONCURRENT_FETCHES);
        assert_eq!(config.selector_cache_capacity, DEFAULT_SELECTOR_CACHE_CAPACITY);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(&config_path, r#"{ "log_level": "debug", "log_format": "json" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.publish_queue_capacity, DEFAULT_PUBLISH_QUEUE_CAPACITY);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.json");

        let config = Config {
            log_level: "trace".to_string(),
            redis_url: Some("redis://cache:6379".to_string()),
            max_concurrent_fetches: 4,
            ..Config::default()
        };
        config.save(&config_path).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config.selector_cache_capacity, DEFAULT_SELECTOR_CACHE_CAPACITY);
    }

    #[test]
    fn test_config_invalid_json() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "not json").unwrap();

        assert!(matches!(
            Config::load_from_file(&config_path),
            Err(CoreError::Json(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_fetch_limit() {
        let config = Config {
            max_concurrent_fetches: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("DOCGRAPH_LOG_LEVEL", "warn"),
            ("DOCGRAPH_LOG_FORMAT", "JSON"),
            ("DOCGRAPH_REDIS_URL", "redis://127.0.0.1:6379"),
            ("DOCGRAPH_MAX_CONCURRENT_FETCHES", "8"),
        ]));

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.max_concurrent_fetches, 8);
    }

    #[test]
    fn test_env_ignores_blank_and_invalid_values() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("DOCGRAPH_LOG_LEVEL", "   "),
            ("DOCGRAPH_LOG_FORMAT", "yaml"),
            ("DOCGRAPH_MAX_CONCURRENT_FETCHES", "0"),
        ]));

        assert_eq!(config, Config::default());
    }
}
