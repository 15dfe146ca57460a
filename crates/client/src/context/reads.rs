//! Cache-aside reads.
//!
//! Every read checks the cache, falls back to a full-table read on a miss and
//! caches only successful results. A failed store read yields the empty shape.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ACTIVE_RIDERS_KEY, DataContext, RIDER_INDEX_KEY, SETTINGS_KEY, TableKind, rows_key};
use crate::index::{AssignmentOffsets, ExtractedTable, RequestOffsets, RiderEntry, RiderIndex, RowRecord, SettingsOffsets};
use crate::lookup::{find_row_by_id, rows_with_id, rows_with_name};

impl DataContext {
    /// The valid working set of a table.
    ///
    /// Never fails: an absent sheet, a denied read or a quota error is logged
    /// and returned as an empty table, which is not cached.
    pub async fn table(&mut self, kind: TableKind) -> Arc<ExtractedTable> {
        let sheet = self.sheet(kind);
        let key = rows_key(&sheet);
        if let Some(table) = self.cache.get::<ExtractedTable>(&key) {
            return table;
        }

        match self.store.read_all(&sheet).await {
            Ok(raw) => {
                let table = ExtractedTable::from_table(&sheet, &raw, &kind.key_columns(&self.config.sheets));
                tracing::debug!(sheet = %sheet, rows = table.len(), "loaded table");
                self.cache.set(key, table, None)
            }
            Err(e) => {
                if e.is_store_access() {
                    tracing::warn!(sheet = %sheet, error = %e, "store refused full-table read; returning empty table");
                } else {
                    tracing::error!(sheet = %sheet, error = %e, "full-table read failed; returning empty table");
                }
                Arc::new(ExtractedTable::empty(&sheet))
            }
        }
    }

    /// The rider hash index, derived from the rider rows.
    pub async fn riders(&mut self) -> Arc<RiderIndex> {
        if let Some(index) = self.cache.get::<RiderIndex>(RIDER_INDEX_KEY) {
            return index;
        }

        let table = self.table(TableKind::Riders).await;
        let index = RiderIndex::build(&table, &self.config.sheets.riders);
        if !self.cache.contains(&rows_key(&table.sheet)) {
            return Arc::new(index);
        }
        self.cache.add_dependency(RIDER_INDEX_KEY, rows_key(&table.sheet));
        self.cache.set(RIDER_INDEX_KEY, index, None)
    }

    /// Number of riders whose status is one of `riders.active_statuses`.
    pub async fn active_rider_count(&mut self) -> usize {
        if let Some(count) = self.cache.get::<usize>(ACTIVE_RIDERS_KEY) {
            return *count;
        }

        let index = self.riders().await;
        let count = index.active_count(&self.config.sheets.riders.active_statuses);
        let source = rows_key(&self.config.sheets.riders.sheet);
        if self.cache.contains(&source) {
            self.cache.add_dependency(ACTIVE_RIDERS_KEY, source);
            self.cache.set(ACTIVE_RIDERS_KEY, count, None);
        }
        count
    }

    /// Rider by identifier, or by name when no identifier matches.
    pub async fn find_rider(&mut self, query: &str) -> Option<RiderEntry> {
        self.riders().await.find(query).cloned()
    }

    /// Request by its identifier, by linear scan.
    pub async fn find_request(&mut self, request_id: &str) -> Option<RowRecord> {
        let table = self.table(TableKind::Requests).await;
        let offsets = RequestOffsets::resolve(&table.header, &self.config.sheets.requests);
        find_row_by_id(&table, offsets.id, request_id).cloned()
    }

    /// Assignment rows that reference `request_id`.
    pub async fn assignments_for_request(&mut self, request_id: &str) -> Vec<RowRecord> {
        let table = self.table(TableKind::Assignments).await;
        let offsets = AssignmentOffsets::resolve(&table.header, &self.config.sheets.assignments);
        rows_with_id(&table, offsets.request_id, request_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Assignment rows for a rider, matched on normalized name.
    pub async fn assignments_for_rider(&mut self, rider_name: &str) -> Vec<RowRecord> {
        let table = self.table(TableKind::Assignments).await;
        let offsets = AssignmentOffsets::resolve(&table.header, &self.config.sheets.assignments);
        rows_with_name(&table, offsets.rider_name, rider_name)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Settings as a key -> value map. Keys are trimmed; the first occurrence wins.
    pub async fn settings(&mut self) -> Arc<BTreeMap<String, String>> {
        if let Some(settings) = self.cache.get::<BTreeMap<String, String>>(SETTINGS_KEY) {
            return settings;
        }

        let table = self.table(TableKind::Settings).await;
        let offsets = SettingsOffsets::resolve(&table.header, &self.config.sheets.settings);
        let mut settings = BTreeMap::new();
        if offsets.key.is_some() {
            for row in &table.rows {
                let key = row.text(offsets.key).trim().to_string();
                if !key.is_empty() {
                    settings.entry(key).or_insert_with(|| row.text(offsets.value));
                }
            }
        }

        if !self.cache.contains(&rows_key(&table.sheet)) {
            return Arc::new(settings);
        }
        self.cache.add_dependency(SETTINGS_KEY, rows_key(&table.sheet));
        self.cache.set(SETTINGS_KEY, settings, None)
    }

    pub async fn setting(&mut self, key: &str) -> Option<String> {
        self.settings().await.get(key.trim()).cloned()
    }

    /// A table row rendered as a column-name -> text map.
    pub async fn row_object(&mut self, kind: TableKind, record: &RowRecord) -> BTreeMap<String, String> {
        self.table(kind).await.row_object(record)
    }
}
