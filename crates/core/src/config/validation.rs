//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache.default_ttl_secs` is 0 or exceeds one day
    /// - `write.batch_threshold` is 0 or exceeds 10000
    /// - a sheet name is empty or used by two tables
    /// - a key column (rider name/id, request id, settings key) is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.default_ttl_secs == 0 {
            return Err(invalid("cache.default_ttl_secs", "must be greater than 0"));
        }
        if self.cache.default_ttl_secs > 86_400 {
            return Err(invalid("cache.default_ttl_secs", "must not exceed one day (86400s)"));
        }

        if self.write.batch_threshold == 0 {
            return Err(invalid("write.batch_threshold", "must be greater than 0"));
        }
        if self.write.batch_threshold > 10_000 {
            return Err(invalid("write.batch_threshold", "must not exceed 10000"));
        }

        let mut seen = HashSet::new();
        for name in self.sheets.sheet_names() {
            if name.trim().is_empty() {
                return Err(invalid("sheets", "sheet names must not be empty"));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid {
                    field: "sheets".into(),
                    reason: format!("sheet name {name:?} is used by more than one table"),
                });
            }
        }

        let key_columns = [
            ("sheets.riders.name", &self.sheets.riders.name),
            ("sheets.riders.id", &self.sheets.riders.id),
            ("sheets.requests.id", &self.sheets.requests.id),
            ("sheets.settings.key", &self.sheets.settings.key),
        ];
        for (field, column) in key_columns {
            if column.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if self.sheets.riders.active_statuses.is_empty() {
            tracing::warn!("sheets.riders.active_statuses is empty; active rider count will always be 0");
        }

        Ok(())
    }
}
