//! Hash index over the rider roster.
//!
//! Names are keyed through [`normalize_name`] (case-insensitive), identifiers
//! through [`normalize_id`] (case-sensitive). Lookups use the same functions,
//! so build and lookup cannot disagree on normalization.

use std::collections::HashMap;

use dispatch_core::config::RiderColumns;
use serde::Serialize;

use super::{ExtractedTable, RiderOffsets};
use crate::lookup::{normalize_id, normalize_name};

/// One rider from the valid working set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct RiderEntry {
    /// Position in the filtered data set.
    pub position: usize,
    /// 1-based row in the sheet.
    pub sheet_row: usize,
    pub name: String,
    pub id: String,
    pub status: String,
    pub phone: String,
    pub email: String,
}

impl RiderEntry {
    /// Whether the status matches one of `active_statuses` under [`normalize_name`].
    pub fn is_active(&self, active_statuses: &[String]) -> bool {
        let status = normalize_name(&self.status);
        active_statuses.iter().any(|s| normalize_name(s) == status)
    }
}

/// Riders keyed by normalized name and by identifier.
#[derive(Debug, Clone, Default)]
pub struct RiderIndex {
    riders: Vec<RiderEntry>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
    offsets: RiderOffsets,
}

impl RiderIndex {
    /// Indexes every row of an extracted rider table.
    ///
    /// The first row wins when two rows share a key; blank keys are not indexed.
    pub fn build(table: &ExtractedTable, columns: &RiderColumns) -> Self {
        let offsets = RiderOffsets::resolve(&table.header, columns);
        if offsets.name.is_none() && offsets.id.is_none() {
            if !table.is_empty() {
                tracing::warn!(sheet = %table.sheet, "rider name and id columns both missing; index undefined");
            }
            return Self { offsets, ..Default::default() };
        }

        let mut index = Self { offsets, ..Default::default() };
        for (position, record) in table.rows.iter().enumerate() {
            let entry = RiderEntry {
                position,
                sheet_row: record.sheet_row,
                name: record.text(offsets.name).trim().to_string(),
                id: record.text(offsets.id).trim().to_string(),
                status: record.text(offsets.status).trim().to_string(),
                phone: record.text(offsets.phone).trim().to_string(),
                email: record.text(offsets.email).trim().to_string(),
            };

            let slot = index.riders.len();
            let name_key = normalize_name(&entry.name);
            if !name_key.is_empty() {
                index.by_name.entry(name_key).or_insert(slot);
            }
            let id_key = normalize_id(&entry.id);
            if !id_key.is_empty() {
                index.by_id.entry(id_key).or_insert(slot);
            }
            index.riders.push(entry);
        }
        index
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RiderEntry> {
        self.by_name.get(&normalize_name(name)).map(|&i| &self.riders[i])
    }

    pub fn find_by_id(&self, id: &str) -> Option<&RiderEntry> {
        self.by_id.get(&normalize_id(id)).map(|&i| &self.riders[i])
    }

    /// Identifier first, then name.
    pub fn find(&self, query: &str) -> Option<&RiderEntry> {
        self.find_by_id(query).or_else(|| self.find_by_name(query))
    }

    /// Riders for which [`RiderEntry::is_active`] holds.
    pub fn active_count(&self, active_statuses: &[String]) -> usize {
        self.riders.iter().filter(|r| r.is_active(active_statuses)).count()
    }

    pub fn riders(&self) -> &[RiderEntry] {
        &self.riders
    }

    pub fn offsets(&self) -> RiderOffsets {
        self.offsets
    }

    pub fn len(&self) -> usize {
        self.riders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.riders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::store::text_row;

    fn columns() -> RiderColumns {
        RiderColumns { name: "Name".into(), id: "ID".into(), ..Default::default() }
    }

    fn index(rows: &[&[&str]]) -> RiderIndex {
        let mut table = vec![text_row(&["Name", "ID", "Status"])];
        table.extend(rows.iter().map(|&r| text_row(r)));
        let extracted = ExtractedTable::from_table("Riders", &table, &["Name", "ID"]);
        RiderIndex::build(&extracted, &columns())
    }

    #[test]
    fn test_name_lookup_is_case_insensitive() {
        let index = index(&[&["", "", ""], &["Ann", "1", "Active"]]);
        assert_eq!(index.len(), 1);
        let lower = index.find_by_name("ann").unwrap();
        let exact = index.find_by_name("Ann").unwrap();
        assert_eq!(lower, exact);
        assert_eq!(index.find_by_name("  ANN ").unwrap().sheet_row, 3);
    }

    #[test]
    fn test_id_lookup_is_case_sensitive() {
        let index = index(&[&["Ann", "R1", ""]]);
        assert!(index.find_by_id("R1").is_some());
        assert!(index.find_by_id(" R1 ").is_some());
        assert!(index.find_by_id("r1").is_none());
    }

    #[test]
    fn test_position_is_within_filtered_set() {
        let index = index(&[&["", "", ""], &["Ann", "1", ""], &["", "", ""], &["Bob", "2", ""]]);
        let bob = index.find_by_id("2").unwrap();
        assert_eq!(bob.position, 1);
        assert_eq!(bob.sheet_row, 5);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let index = index(&[&["Ann", "1", ""], &["ann", "2", ""]]);
        assert_eq!(index.find_by_name("ANN").unwrap().id, "1");
        assert_eq!(index.find_by_id("2").unwrap().name, "ann");
    }

    #[test]
    fn test_find_prefers_id_over_name() {
        let index = index(&[&["7", "A", ""], &["Bob", "7", ""]]);
        assert_eq!(index.find("7").unwrap().name, "Bob");
        assert_eq!(index.find("bob").unwrap().id, "7");
        assert!(index.find("nobody").is_none());
    }

    #[test]
    fn test_rows_with_only_id_are_indexed_by_id() {
        let index = index(&[&["", "R9", ""]]);
        assert_eq!(index.len(), 1);
        assert!(index.find_by_id("R9").is_some());
        assert!(index.find_by_name("").is_none());
    }

    #[test]
    fn test_active_count() {
        let index = index(&[&["Ann", "1", "Active"], &["Bob", "2", "inactive"], &["Cy", "3", "ACTIVE"]]);
        assert_eq!(index.active_count(&["Active".to_string()]), 2);
        assert_eq!(index.active_count(&[]), 0);
    }

    #[test]
    fn test_active_status_folds_non_ascii_case() {
        let index = index(&[&["Åsa", "1", "ÄKTIV "], &["Ben", "2", "äktiv"], &["Cy", "3", "passiv"]]);
        assert_eq!(index.active_count(&["Äktiv".to_string()]), 2);
    }

    #[test]
    fn test_missing_key_columns_give_empty_index() {
        let table = vec![text_row(&["Foo", "Bar"]), text_row(&["x", "y"])];
        let extracted = ExtractedTable::from_table("Riders", &table, &["Name", "ID"]);
        let index = RiderIndex::build(&extracted, &columns());
        assert!(index.is_empty());
        assert_eq!(index.offsets().name, None);
    }
}
