//! Data access for the dispatch workbook.
//!
//! This crate provides the read-through cache, header indexing, row lookups
//! and write coalescing that sit between the MCP tools and a
//! [`dispatch_core::TabularStore`].

pub mod batch;
pub mod cache;
pub mod context;
pub mod index;
pub mod lookup;

pub use batch::{
    ApplyReport, CellUpdate, PerCellStrategy, RowRunStrategy, WriteBatch, WriteOp, WriteStrategy, apply_updates,
    strategy_for,
};
pub use cache::{CacheStats, DataCache};
pub use context::{DataContext, TableKind};
pub use index::{ExtractedTable, HeaderIndex, RiderEntry, RiderIndex, RowRecord};
pub use lookup::{find_row_by_id, normalize_id, normalize_name, rows_with_id, rows_with_name};
