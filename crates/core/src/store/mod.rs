//! Tabular store contract and its implementations.
//!
//! The data layer only talks to a store through [`TabularStore`]. Coordinates
//! are 1-based the way sheets number them: row 1 is the header row and
//! column 1 is the first column.
//!
//! - [`MemoryStore`]: in-process sheets with a call log and failure injection
//! - [`SqliteStore`]: cells persisted in SQLite via tokio-rusqlite

pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod value;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

pub use memory::{FailureKind, MemoryStore, StoreCall, StoreOp};
pub use sqlite::SqliteStore;
pub use value::{CellValue, text_row};

/// Highest row number a store accepts.
pub const MAX_ROWS: usize = 1_000_000;

/// Highest column number a store accepts.
pub const MAX_COLS: usize = 18_278;

/// Most cells a single read may materialize.
pub const MAX_CELLS: usize = 5_000_000;

/// A two-dimensional block of cells. For full reads, row 0 is the header row.
pub type Table = Vec<Vec<CellValue>>;

/// A rectangular block addressed by its top-left cell and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

impl RangeSpec {
    pub fn new(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self { row, col, rows, cols }
    }

    pub fn last_row(&self) -> usize {
        self.row.saturating_add(self.rows.saturating_sub(1))
    }

    pub fn last_col(&self) -> usize {
        self.col.saturating_add(self.cols.saturating_sub(1))
    }
}

/// The remote tabular store the data layer reads from and writes to.
///
/// Implementations return [`Error::SheetNotFound`] for absent sheets and
/// [`Error::InvalidInput`] for coordinates outside `1..=MAX_ROWS` and
/// `1..=MAX_COLS`.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Every populated row, each padded to the widest row.
    async fn read_all(&self, sheet: &str) -> Result<Table, Error>;

    /// A rectangular block; missing cells come back as [`CellValue::Empty`].
    async fn read_range(&self, sheet: &str, range: RangeSpec) -> Result<Table, Error>;

    async fn write_cell(&self, sheet: &str, row: usize, col: usize, value: CellValue) -> Result<(), Error>;

    /// Writes `values` across one row starting at `col`.
    async fn write_range(&self, sheet: &str, row: usize, col: usize, values: Vec<CellValue>) -> Result<(), Error>;

    /// Appends after the last populated row; returns the new row number.
    async fn append_row(&self, sheet: &str, values: Vec<CellValue>) -> Result<usize, Error>;

    /// Synchronizes pending writes.
    async fn flush(&self) -> Result<(), Error>;

    /// Creates the sheet with `header` as row 1 when it does not exist.
    /// Returns whether it was created.
    async fn get_or_create_sheet(&self, sheet: &str, header: &[String]) -> Result<bool, Error>;
}

/// Checks that a cell lies in `1..=MAX_ROWS` x `1..=MAX_COLS`.
///
/// # Errors
///
/// [`Error::InvalidInput`] naming the offending coordinates.
pub fn check_coords(row: usize, col: usize) -> Result<(), Error> {
    if row == 0 || col == 0 {
        return Err(Error::InvalidInput(format!("cell coordinates are 1-based, got row {row} col {col}")));
    }
    if row > MAX_ROWS || col > MAX_COLS {
        return Err(Error::InvalidInput(format!(
            "cell row {row} col {col} is outside {MAX_ROWS} rows x {MAX_COLS} columns"
        )));
    }
    Ok(())
}

/// Checks a one-row run of `width` cells starting at `(row, col)`.
pub(crate) fn check_span(row: usize, col: usize, width: usize) -> Result<(), Error> {
    check_coords(row, col)?;
    let last = col.checked_add(width.saturating_sub(1)).unwrap_or(usize::MAX);
    if last > MAX_COLS {
        return Err(Error::InvalidInput(format!("{width} cells from column {col} pass column {MAX_COLS}")));
    }
    Ok(())
}

pub(crate) fn check_range(range: &RangeSpec) -> Result<(), Error> {
    check_coords(range.row, range.col)?;
    if range.rows == 0 || range.cols == 0 {
        return Err(Error::InvalidInput(format!("empty range {}x{}", range.rows, range.cols)));
    }
    check_coords(range.last_row(), range.last_col())?;
    check_cells(range.rows, range.cols)
}

/// Checks that a `rows` x `cols` block stays within [`MAX_CELLS`].
pub(crate) fn check_cells(rows: usize, cols: usize) -> Result<(), Error> {
    match rows.checked_mul(cols) {
        Some(cells) if cells <= MAX_CELLS => Ok(()),
        _ => Err(Error::InvalidInput(format!("block of {rows}x{cols} exceeds {MAX_CELLS} cells"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let range = RangeSpec::new(2, 3, 4, 2);
        assert_eq!(range.last_row(), 5);
        assert_eq!(range.last_col(), 4);
    }

    #[test]
    fn test_check_coords() {
        assert!(check_coords(1, 1).is_ok());
        assert!(matches!(check_coords(0, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(check_range(&RangeSpec::new(1, 1, 0, 1)), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_coordinate_upper_bounds() {
        assert!(check_coords(MAX_ROWS, MAX_COLS).is_ok());
        assert!(matches!(check_coords(MAX_ROWS + 1, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(check_coords(1, MAX_COLS + 1), Err(Error::InvalidInput(_))));
        assert!(matches!(check_coords(usize::MAX / 2, 1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_span_and_block_limits() {
        assert!(check_span(2, MAX_COLS - 1, 2).is_ok());
        assert!(check_span(2, MAX_COLS, 2).is_err());
        assert!(check_span(2, 1, usize::MAX).is_err());
        assert!(check_range(&RangeSpec::new(1, 1, usize::MAX, 1)).is_err());
        assert!(check_range(&RangeSpec::new(1, 1, MAX_ROWS, MAX_COLS)).is_err());
        assert!(check_cells(1_000, 1_000).is_ok());
    }
}
