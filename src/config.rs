//! TOML configuration with environment overrides.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! A handful of environment variables override the file after parsing:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `INTERNAL_VALIDATION_ENABLED` | `false` disables the internal source |
//! | `GOOGLE_SEARCH_ENABLED`, `SEARCH_ENABLED` | enable/disable external search |
//! | `RATE_LIMIT_PER_HOUR` | request budget per client per window |
//! | `PORT` | replaces the port of `server.bind` |
//! | `IDEAVOID_ENV`, `NODE_ENV` | `development` exposes error detail |
//!
//! Flags are read once here and passed into components at construction.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_ideas_path")]
    pub ideas_path: PathBuf,
    #[serde(default = "default_contributions_path")]
    pub contributions_path: PathBuf,
    #[serde(default = "default_visitors_path")]
    pub visitors_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ideas_path: default_ideas_path(),
            contributions_path: default_contributions_path(),
            visitors_path: default_visitors_path(),
        }
    }
}

fn default_ideas_path() -> PathBuf {
    PathBuf::from("./combined_ideas.json")
}
fn default_contributions_path() -> PathBuf {
    PathBuf::from("./data/userContributions.json")
}
fn default_visitors_path() -> PathBuf {
    PathBuf::from("./data/visitorData.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub internal_enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            internal_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    86_400
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// External search is opt-in.
    #[serde(default)]
    pub enabled: bool,
    /// `browser` (headless Chromium) or `http` (plain GET).
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_engine_url")]
    pub engine_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    #[serde(default = "default_result_wait_timeout_secs")]
    pub result_wait_timeout_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Chromium binary; autodetected when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            driver: default_driver(),
            engine_url: default_engine_url(),
            user_agent: default_user_agent(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            result_wait_timeout_secs: default_result_wait_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_results: default_max_results(),
            chrome_path: None,
        }
    }
}

fn default_driver() -> String {
    "browser".to_string()
}
fn default_engine_url() -> String {
    "https://www.google.com/search".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_navigation_timeout_secs() -> u64 {
    30
}
fn default_result_wait_timeout_secs() -> u64 {
    10
}
fn default_max_results() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// Include error detail in 500 responses.
    #[serde(default)]
    pub development: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            development: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3001".to_string()
}
fn default_rate_limit_requests() -> u32 {
    100
}
fn default_rate_limit_window_secs() -> u64 {
    3_600
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_ms: default_delay_ms(),
            sample_size: default_sample_size(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}
fn default_delay_ms() -> u64 {
    1_000
}
fn default_sample_size() -> usize {
    5
}

impl Config {
    /// All defaults, no file.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("INTERNAL_VALIDATION_ENABLED") {
            self.validation.internal_enabled = v != "false";
        }
        if let Some(v) = lookup("GOOGLE_SEARCH_ENABLED").or_else(|| lookup("SEARCH_ENABLED")) {
            self.search.enabled = !v.is_empty() && v != "false";
        }
        if let Some(n) = lookup("RATE_LIMIT_PER_HOUR").and_then(|v| v.parse::<u32>().ok()) {
            self.server.rate_limit_requests = n;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse::<u16>().ok()) {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(h, _)| h.to_string())
                .unwrap_or_else(|| "127.0.0.1".to_string());
            self.server.bind = format!("{}:{}", host, port);
        }
        if let Some(env) = lookup("IDEAVOID_ENV").or_else(|| lookup("NODE_ENV")) {
            self.server.development = env == "development";
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.batch_size == 0 {
            anyhow::bail!("batch.batch_size must be > 0");
        }
        if self.server.rate_limit_requests == 0 {
            anyhow::bail!("server.rate_limit_requests must be > 0");
        }
        if self.server.rate_limit_window_secs == 0 {
            anyhow::bail!("server.rate_limit_window_secs must be > 0");
        }
        if self.search.navigation_timeout_secs == 0 || self.search.result_wait_timeout_secs == 0 {
            anyhow::bail!("search timeouts must be > 0");
        }
        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be > 0");
        }
        match self.search.driver.as_str() {
            "browser" | "http" => {}
            other => anyhow::bail!(
                "Unknown search driver: '{}'. Must be browser or http.",
                other
            ),
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults (with
/// environment overrides applied). A file that exists must parse.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    tracing::debug!(path = %path.display(), "config file not found, using defaults");
    let mut config = Config::minimal();
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.validation.internal_enabled);
        assert!(!config.search.enabled);
        assert_eq!(config.server.rate_limit_requests, 100);
        assert_eq!(config.server.rate_limit_window_secs, 3600);
        assert_eq!(config.batch.batch_size, 100);
        assert_eq!(config.search.driver, "browser");
        config.validate().unwrap();
    }

    #[test]
    fn test_sections_parse() {
        let config = parse_config(
            r#"
[data]
ideas_path = "/tmp/ideas.json"

[search]
enabled = true
driver = "http"
max_results = 5

[server]
bind = "0.0.0.0:8080"
development = true
"#,
        )
        .unwrap();
        assert_eq!(config.data.ideas_path, PathBuf::from("/tmp/ideas.json"));
        assert!(config.search.enabled);
        assert_eq!(config.search.driver, "http");
        assert_eq!(config.search.max_results, 5);
        assert!(config.server.development);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("INTERNAL_VALIDATION_ENABLED", "false"),
            ("GOOGLE_SEARCH_ENABLED", "true"),
            ("RATE_LIMIT_PER_HOUR", "7"),
            ("PORT", "4000"),
            ("NODE_ENV", "development"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::minimal();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert!(!config.validation.internal_enabled);
        assert!(config.search.enabled);
        assert_eq!(config.server.rate_limit_requests, 7);
        assert_eq!(config.server.bind, "127.0.0.1:4000");
        assert!(config.server.development);
    }

    #[test]
    fn test_search_disabled_by_env() {
        let mut config = parse_config("[search]\nenabled = true").unwrap();
        config.apply_env_overrides(|k| (k == "GOOGLE_SEARCH_ENABLED").then(|| "false".to_string()));
        assert!(!config.search.enabled);
    }

    #[test]
    fn test_rejects_unknown_driver() {
        let config = parse_config("[search]\ndriver = \"lynx\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.batch.sample_size, 5);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[batch\nbatch_size = ").unwrap();
        assert!(load_or_default(&bad).is_err());
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let config = parse_config("[batch]\nbatch_size = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
