//! Request-scoped data access.
//!
//! [`DataContext`] owns the cache, the pending write batches and the write
//! strategy, and talks to the store on the caller's behalf. One context serves
//! one logical operation at a time (`&mut self`); call
//! [`DataContext::begin_request`] at the start of each.
//!
//! Reads favor availability: store failures are logged and become the empty
//! shape. Writes favor correctness: failures are logged and returned.

mod reads;
mod writes;

use std::collections::HashMap;
use std::sync::Arc;

use dispatch_core::config::SheetsConfig;
use dispatch_core::{AppConfig, TabularStore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::batch::{WriteBatch, WriteStrategy, strategy_for};
use crate::cache::{CacheStats, DataCache};

/// The logical tables of the dispatch workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Requests,
    Riders,
    Assignments,
    Settings,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [TableKind::Requests, TableKind::Riders, TableKind::Assignments, TableKind::Settings];

    pub fn sheet(self, sheets: &SheetsConfig) -> &str {
        match self {
            TableKind::Requests => &sheets.requests.sheet,
            TableKind::Riders => &sheets.riders.sheet,
            TableKind::Assignments => &sheets.assignments.sheet,
            TableKind::Settings => &sheets.settings.sheet,
        }
    }

    /// Columns that decide whether a row belongs to the valid working set.
    pub fn key_columns(self, sheets: &SheetsConfig) -> Vec<&str> {
        match self {
            TableKind::Requests => vec![sheets.requests.id.as_str()],
            TableKind::Riders => vec![sheets.riders.name.as_str(), sheets.riders.id.as_str()],
            TableKind::Assignments => vec![sheets.assignments.id.as_str(), sheets.assignments.request_id.as_str()],
            TableKind::Settings => vec![sheets.settings.key.as_str()],
        }
    }

    pub fn header(self, sheets: &SheetsConfig) -> Vec<String> {
        match self {
            TableKind::Requests => sheets.requests.header(),
            TableKind::Riders => sheets.riders.header(),
            TableKind::Assignments => sheets.assignments.header(),
            TableKind::Settings => sheets.settings.header(),
        }
    }
}

pub(crate) fn rows_key(sheet: &str) -> String {
    format!("rows:{sheet}")
}

pub(crate) const RIDER_INDEX_KEY: &str = "riders:index";
pub(crate) const ACTIVE_RIDERS_KEY: &str = "riders:active_count";
pub(crate) const SETTINGS_KEY: &str = "settings:map";

/// Cache, pending writes and store handle for one execution context.
pub struct DataContext {
    store: Arc<dyn TabularStore>,
    config: AppConfig,
    cache: DataCache,
    strategy: Box<dyn WriteStrategy>,
    pending: HashMap<TableKind, WriteBatch>,
}

impl DataContext {
    pub fn new(store: Arc<dyn TabularStore>, config: AppConfig) -> Self {
        let cache = DataCache::from_config(&config.cache);
        let strategy = strategy_for(config.write.strategy);
        Self { store, config, cache, strategy, pending: HashMap::new() }
    }

    /// Replaces the configured write strategy.
    pub fn with_strategy(mut self, strategy: Box<dyn WriteStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub(crate) fn sheet(&self, kind: TableKind) -> String {
        kind.sheet(&self.config.sheets).to_string()
    }

    /// Resets per-request state.
    ///
    /// Pending writes left by an aborted operation are discarded. The cache is
    /// cleared when `cache.reset_per_request` is set; otherwise only expired
    /// entries are purged.
    pub fn begin_request(&mut self) {
        let discarded: usize = self.pending.values().map(WriteBatch::len).sum();
        if discarded > 0 {
            tracing::warn!(discarded, "discarding pending writes from an unfinished operation");
        }
        self.pending.clear();

        if self.config.cache.reset_per_request {
            self.cache.clear();
        } else {
            let purged = self.cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "purged expired cache entries");
            }
        }
    }

    /// Number of queued, unflushed updates across all tables.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(WriteBatch::len).sum()
    }

    /// Drops the cached rows of `kind` and everything derived from them.
    ///
    /// Follows dependency edges one hop, or transitively when
    /// `cache.cascade_invalidation` is set. Returns the keys removed.
    pub fn invalidate(&mut self, kind: TableKind) -> Vec<String> {
        let key = rows_key(kind.sheet(&self.config.sheets));
        if self.config.cache.cascade_invalidation {
            self.cache.invalidate_cascade(&key)
        } else {
            self.cache.invalidate_with_dependencies(&key)
        }
    }

    /// Drops every cached entry.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for DataContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContext")
            .field("cache", &self.cache)
            .field("strategy", &self.strategy)
            .field("pending", &self.pending_len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use dispatch_core::store::{MemoryStore, text_row};

    /// A workbook with the default sheet layout and a few rows in each table.
    pub fn workbook() -> MemoryStore {
        MemoryStore::new()
            .with_sheet(
                "Riders",
                vec![
                    text_row(&["Full Name", "Rider ID", "Status", "Phone", "Email"]),
                    text_row(&["Ann Lee", "R1", "Active", "555-0101", "ann@example.org"]),
                    text_row(&["", "", "", "", ""]),
                    text_row(&["Bob Roy", "R2", "Inactive", "", ""]),
                    text_row(&["cy park", "R3", "active", "", ""]),
                ],
            )
            .with_sheet(
                "Requests",
                vec![
                    text_row(&[
                        "Request ID",
                        "Date",
                        "Requester",
                        "Start Location",
                        "End Location",
                        "Riders Needed",
                        "Status",
                        "Notes",
                    ]),
                    text_row(&["A-100", "2026-10-20", "City Hall", "Main St", "Park", "2", "New", ""]),
                    text_row(&["A-101", "2026-10-21", "School", "Oak Ave", "Stadium", "4", "Assigned", ""]),
                ],
            )
            .with_sheet(
                "Assignments",
                vec![
                    text_row(&["Assignment ID", "Request ID", "Rider Name", "Status", "Event Date"]),
                    text_row(&["AS-1", "A-101", "Ann Lee", "Assigned", "2026-10-21"]),
                    text_row(&["AS-2", "A-101", "Bob Roy", "Assigned", "2026-10-21"]),
                    text_row(&["AS-3", "A-100", "ann lee", "Assigned", "2026-10-20"]),
                ],
            )
            .with_sheet(
                "Settings",
                vec![
                    text_row(&["Key", "Value"]),
                    text_row(&["dispatch_email", "dispatch@example.org"]),
                    text_row(&["", "orphan"]),
                ],
            )
    }
}
