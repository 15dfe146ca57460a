//! Row projection over raw tables.
//!
//! A raw table is a header row followed by data rows. [`HeaderIndex`] maps
//! column names to zero-based offsets, scanned once per snapshot;
//! [`ExtractedTable`] keeps the data rows that carry at least one key value.

pub mod offsets;
pub mod riders;

use std::collections::{BTreeMap, HashMap};

use dispatch_core::{CellValue, Error, Table};
use serde::Serialize;

pub use offsets::{AssignmentOffsets, RequestOffsets, RiderOffsets, SettingsOffsets};
pub use riders::{RiderEntry, RiderIndex};

/// Column name -> zero-based offset, derived from a header row.
///
/// Only valid for the snapshot it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderIndex {
    offsets: HashMap<String, usize>,
    names: Vec<String>,
}

impl HeaderIndex {
    /// Names are trimmed; blank header cells are skipped; the first duplicate wins.
    pub fn from_header(header: &[CellValue]) -> Self {
        let mut offsets = HashMap::new();
        let mut names = Vec::new();
        for (offset, cell) in header.iter().enumerate() {
            let name = cell.as_text().trim().to_string();
            if name.is_empty() || offsets.contains_key(&name) {
                continue;
            }
            offsets.insert(name.clone(), offset);
            names.push(name);
        }
        Self { offsets, names }
    }

    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name.trim()).copied()
    }

    /// Offset of `name`, or [`Error::UnknownColumn`].
    pub fn require(&self, sheet: &str, name: &str) -> Result<usize, Error> {
        self.offset(name)
            .ok_or_else(|| Error::UnknownColumn { sheet: sheet.to_string(), column: name.to_string() })
    }

    /// Header names in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Columns spanned up to the last named one. Exceeds `len` when the
    /// header has blank cells.
    pub fn width(&self) -> usize {
        self.offsets.values().max().map_or(0, |&o| o + 1)
    }
}

/// A data row together with its 1-based row number in the sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRecord {
    pub sheet_row: usize,
    pub cells: Vec<CellValue>,
}

impl RowRecord {
    pub fn get(&self, offset: Option<usize>) -> Option<&CellValue> {
        offset.and_then(|o| self.cells.get(o))
    }

    /// Display text at `offset`; empty when the offset is undefined or out of range.
    pub fn text(&self, offset: Option<usize>) -> String {
        self.get(offset).map(CellValue::as_text).unwrap_or_default()
    }
}

/// The valid working set of a sheet.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTable {
    pub sheet: String,
    pub header: HeaderIndex,
    pub rows: Vec<RowRecord>,
}

impl ExtractedTable {
    /// The empty shape returned when a sheet cannot be read.
    pub fn empty(sheet: &str) -> Self {
        Self { sheet: sheet.to_string(), ..Default::default() }
    }

    /// Builds the header index and keeps rows where at least one key column is
    /// non-blank after trimming.
    ///
    /// Key columns missing from the header are ignored; when none resolve, only
    /// fully blank rows are dropped.
    pub fn from_table(sheet: &str, table: &Table, key_columns: &[&str]) -> Self {
        let Some((header_row, data)) = table.split_first() else {
            return Self::empty(sheet);
        };

        let header = HeaderIndex::from_header(header_row);
        let key_offsets: Vec<usize> = key_columns.iter().filter_map(|name| header.offset(name)).collect();
        if key_offsets.len() < key_columns.len() {
            tracing::warn!(
                sheet,
                expected = key_columns.len(),
                found = key_offsets.len(),
                "key columns missing from header"
            );
        }

        let rows = data
            .iter()
            .enumerate()
            .filter(|(_, cells)| {
                if key_offsets.is_empty() {
                    cells.iter().any(|c| !c.is_blank())
                } else {
                    key_offsets.iter().any(|&o| cells.get(o).is_some_and(|c| !c.is_blank()))
                }
            })
            .map(|(i, cells)| RowRecord { sheet_row: i + 2, cells: cells.clone() })
            .collect();

        Self { sheet: sheet.to_string(), header, rows }
    }

    pub fn offset(&self, name: &str) -> Option<usize> {
        self.header.offset(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A row as a column-name -> display-text map.
    pub fn row_object(&self, record: &RowRecord) -> BTreeMap<String, String> {
        self.header
            .names()
            .iter()
            .map(|name| (name.clone(), record.text(self.header.offset(name))))
            .collect()
    }
}
