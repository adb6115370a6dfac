//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MASTERBOOK_*)
//! 2. TOML config file (if MASTERBOOK_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MASTERBOOK_*)
/// 2. TOML config file (if MASTERBOOK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base path of the remote master-data endpoints.
    ///
    /// Set via MASTERBOOK_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path to the SQLite store.
    ///
    /// Set via MASTERBOOK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in milliseconds.
    ///
    /// Set via MASTERBOOK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Upper bound on table fetches running at once.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Whether to load every table at startup.
    #[serde(default = "default_true")]
    pub preload: bool,

    /// Tables skipped by the startup preload; they still load lazily.
    #[serde(default = "default_preload_excluded")]
    pub preload_excluded: Vec<String>,
}

fn default_base_url() -> String {
    "https://masterdata.example.invalid/master".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./masterbook.sqlite")
}

fn default_user_agent() -> String {
    "masterbook/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_preload_excluded() -> Vec<String> {
    ["TowerBattleQuestMB", "QuestMB", "BossBattleEnemyMB", "TowerBattleEnemyMB"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            preload: true,
            preload_excluded: default_preload_excluded(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Preload exclusions as a set.
    pub fn preload_excluded_set(&self) -> HashSet<String> {
        self.preload_excluded.iter().cloned().collect()
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MASTERBOOK_`
    /// 2. TOML file from `MASTERBOOK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, an environment
    /// variable cannot be parsed, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MASTERBOOK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MASTERBOOK_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./masterbook.sqlite"));
        assert_eq!(config.user_agent, "masterbook/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_concurrent_fetches, 8);
        assert!(config.preload);
        assert!(config.preload_excluded.contains(&"QuestMB".to_string()));
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_preload_excluded_set() {
        let config = AppConfig { preload_excluded: vec!["A".into(), "B".into(), "A".into()], ..Default::default() };
        let set = config.preload_excluded_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("B"));
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string("timeout_ms = 5000\npreload = false"));
        let config: AppConfig = figment.extract().unwrap();
        assert_eq!(config.timeout_ms, 5000);
        assert!(!config.preload);
        assert_eq!(config.user_agent, "masterbook/0.1");
    }
}
