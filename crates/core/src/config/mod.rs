//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DISPATCH_*, `__` separates nested keys)
//! 2. TOML config file (if DISPATCH_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod sheets;
mod validation;

pub use sheets::{AssignmentColumns, RequestColumns, RiderColumns, SettingsColumns, SheetsConfig};
pub use validation::ConfigError;

/// Which store backs the data layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Sqlite,
    Memory,
}

/// Which coalescing policy turns pending updates into store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategyKind {
    /// Group by row, one ranged write per contiguous column run.
    RowRuns,
    /// One write per cell.
    PerCell,
}

/// Cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default time-to-live for cache entries, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Clear the cache at the start of every request.
    #[serde(default)]
    pub reset_per_request: bool,

    /// Follow dependency edges transitively on invalidation instead of one hop.
    #[serde(default)]
    pub cascade_invalidation: bool,
}

/// Write batching tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Number of queued updates that triggers an automatic flush.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,

    #[serde(default = "default_strategy")]
    pub strategy: WriteStrategyKind,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DISPATCH_*)
/// 2. TOML config file (if DISPATCH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite workbook database.
    ///
    /// Set via DISPATCH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Backing store.
    ///
    /// Set via DISPATCH_STORE environment variable (`sqlite` or `memory`).
    #[serde(default = "default_store")]
    pub store: StoreKind,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub write: WriteConfig,

    /// Sheet names and column names per logical table.
    #[serde(default)]
    pub sheets: SheetsConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./dispatch.sqlite")
}

fn default_store() -> StoreKind {
    StoreKind::Sqlite
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_batch_threshold() -> usize {
    50
}

fn default_strategy() -> WriteStrategyKind {
    WriteStrategyKind::RowRuns
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl_secs: default_ttl_secs(), reset_per_request: false, cascade_invalidation: false }
    }
}

impl CacheConfig {
    /// Default TTL as Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self { batch_threshold: default_batch_threshold(), strategy: default_strategy() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            store: default_store(),
            cache: CacheConfig::default(),
            write: WriteConfig::default(),
            sheets: SheetsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DISPATCH_`
    /// 2. TOML file from `DISPATCH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DISPATCH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DISPATCH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
