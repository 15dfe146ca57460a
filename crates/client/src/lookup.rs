//! Key normalization and scan-based lookups.
//!
//! Un-indexed tables (requests, assignments) are searched linearly; at this
//! data scale that is cheaper than maintaining another index. Misses are
//! `None` or an empty `Vec`, never errors.

use crate::index::{ExtractedTable, RowRecord};

/// Name keys: trimmed and lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Identifier keys: trimmed, case preserved.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_string()
}

/// First row whose cell at `offset` equals `id` after [`normalize_id`].
///
/// An undefined offset or a blank `id` is a miss.
pub fn find_row_by_id<'a>(table: &'a ExtractedTable, offset: Option<usize>, id: &str) -> Option<&'a RowRecord> {
    let offset = offset?;
    let needle = normalize_id(id);
    if needle.is_empty() {
        return None;
    }
    table
        .rows
        .iter()
        .find(|row| normalize_id(&row.text(Some(offset))) == needle)
}

/// Every row whose cell at `offset` equals `id` after [`normalize_id`].
pub fn rows_with_id<'a>(table: &'a ExtractedTable, offset: Option<usize>, id: &str) -> Vec<&'a RowRecord> {
    rows_matching(table, offset, &normalize_id(id), normalize_id)
}

/// Every row whose cell at `offset` equals `name` after [`normalize_name`].
pub fn rows_with_name<'a>(table: &'a ExtractedTable, offset: Option<usize>, name: &str) -> Vec<&'a RowRecord> {
    rows_matching(table, offset, &normalize_name(name), normalize_name)
}

fn rows_matching<'a>(
    table: &'a ExtractedTable, offset: Option<usize>, needle: &str, normalize: fn(&str) -> String,
) -> Vec<&'a RowRecord> {
    let Some(offset) = offset else {
        return Vec::new();
    };
    if needle.is_empty() {
        return Vec::new();
    }
    table
        .rows
        .iter()
        .filter(|row| normalize(&row.text(Some(offset))) == needle)
        .collect()
}
