//! Write batching and coalescing.
//!
//! Store cost is dominated by call count, so pending cell updates are planned
//! into as few writes as the [`WriteStrategy`] allows and followed by a single
//! flush. [`RowRunStrategy`] groups by row and turns a contiguous run of
//! columns into one ranged write; [`PerCellStrategy`] writes every cell on its
//! own.
//!
//! A failed write is logged and returned to the caller. Writes that already
//! went through stay applied; there is no rollback.

use std::collections::BTreeMap;
use std::fmt;

use dispatch_core::config::WriteStrategyKind;
use dispatch_core::store::check_coords;
use dispatch_core::{CellValue, Error, TabularStore};
use serde::{Deserialize, Serialize};

/// A pending write of one cell, in 1-based sheet coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: CellValue,
}

impl CellUpdate {
    pub fn new(row: usize, col: usize, value: impl Into<CellValue>) -> Self {
        Self { row, col, value: value.into() }
    }
}

/// A single store call produced by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Cell { row: usize, col: usize, value: CellValue },
    Range { row: usize, col: usize, values: Vec<CellValue> },
}

impl WriteOp {
    pub fn row(&self) -> usize {
        match self {
            WriteOp::Cell { row, .. } | WriteOp::Range { row, .. } => *row,
        }
    }
}

/// Turns updates into store writes.
pub trait WriteStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn plan(&self, updates: &[CellUpdate]) -> Vec<WriteOp>;
}

/// Row -> column -> value. Later updates to the same cell replace earlier ones.
fn coalesce(updates: &[CellUpdate]) -> BTreeMap<usize, BTreeMap<usize, CellValue>> {
    let mut rows: BTreeMap<usize, BTreeMap<usize, CellValue>> = BTreeMap::new();
    for update in updates {
        rows.entry(update.row).or_default().insert(update.col, update.value.clone());
    }
    rows
}

/// Groups by row and splits each row's columns into maximal contiguous runs.
///
/// A run of two or more columns becomes one ranged write; a lone column
/// becomes a cell write. A row whose columns are one contiguous run therefore
/// costs a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowRunStrategy;

impl WriteStrategy for RowRunStrategy {
    fn name(&self) -> &'static str {
        "row_runs"
    }

    fn plan(&self, updates: &[CellUpdate]) -> Vec<WriteOp> {
        let mut ops = Vec::new();
        for (row, cells) in coalesce(updates) {
            let mut run: Vec<(usize, CellValue)> = Vec::new();
            for (col, value) in cells {
                if run.last().is_some_and(|(prev, _)| prev + 1 != col) {
                    ops.push(run_op(row, std::mem::take(&mut run)));
                }
                run.push((col, value));
            }
            if !run.is_empty() {
                ops.push(run_op(row, run));
            }
        }
        ops
    }
}

fn run_op(row: usize, mut run: Vec<(usize, CellValue)>) -> WriteOp {
    let col = run[0].0;
    if run.len() == 1 {
        let (_, value) = run.remove(0);
        WriteOp::Cell { row, col, value }
    } else {
        WriteOp::Range { row, col, values: run.into_iter().map(|(_, v)| v).collect() }
    }
}

/// One write per cell, after last-write-wins coalescing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerCellStrategy;

impl WriteStrategy for PerCellStrategy {
    fn name(&self) -> &'static str {
        "per_cell"
    }

    fn plan(&self, updates: &[CellUpdate]) -> Vec<WriteOp> {
        coalesce(updates)
            .into_iter()
            .flat_map(|(row, cells)| cells.into_iter().map(move |(col, value)| WriteOp::Cell { row, col, value }))
            .collect()
    }
}

/// The strategy selected by configuration.
pub fn strategy_for(kind: WriteStrategyKind) -> Box<dyn WriteStrategy> {
    match kind {
        WriteStrategyKind::RowRuns => Box::new(RowRunStrategy),
        WriteStrategyKind::PerCell => Box::new(PerCellStrategy),
    }
}

/// What an apply call sent to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ApplyReport {
    /// Updates received, before coalescing.
    pub updates: usize,
    pub cell_writes: usize,
    pub range_writes: usize,
    /// Distinct rows touched.
    pub rows: usize,
}

impl ApplyReport {
    pub fn absorb(&mut self, other: ApplyReport) {
        self.updates += other.updates;
        self.cell_writes += other.cell_writes;
        self.range_writes += other.range_writes;
        self.rows += other.rows;
    }

    pub fn store_calls(&self) -> usize {
        self.cell_writes + self.range_writes
    }
}

/// Applies `updates` to `sheet` through `strategy`, then flushes once.
///
/// Coordinates are checked before anything is written. Empty input makes no
/// store calls.
///
/// # Errors
///
/// - [`Error::InvalidInput`] for a row or column below 1 or past the sheet limits
/// - [`Error::WriteFailed`] wrapping the store error of the first failed write
/// - the store error of the final flush
pub async fn apply_updates(
    store: &dyn TabularStore, sheet: &str, updates: &[CellUpdate], strategy: &dyn WriteStrategy,
) -> Result<ApplyReport, Error> {
    if updates.is_empty() {
        return Ok(ApplyReport::default());
    }
    for update in updates {
        check_coords(update.row, update.col)?;
    }

    let ops = strategy.plan(updates);
    let mut report = ApplyReport { updates: updates.len(), ..Default::default() };
    let mut last_row = None;

    for op in ops {
        let row = op.row();
        let result = match op {
            WriteOp::Cell { row, col, value } => {
                report.cell_writes += 1;
                store.write_cell(sheet, row, col, value).await
            }
            WriteOp::Range { row, col, values } => {
                report.range_writes += 1;
                store.write_range(sheet, row, col, values).await
            }
        };

        if let Err(e) = result {
            tracing::error!(sheet, row, error = %e, strategy = strategy.name(), "batched write failed; earlier writes stay applied");
            return Err(Error::WriteFailed { sheet: sheet.to_string(), row, source: Box::new(e) });
        }
        if last_row != Some(row) {
            report.rows += 1;
            last_row = Some(row);
        }
    }

    if let Err(e) = store.flush().await {
        tracing::error!(sheet, error = %e, "flush after batched write failed");
        return Err(e);
    }

    tracing::debug!(
        sheet,
        updates = report.updates,
        cell_writes = report.cell_writes,
        range_writes = report.range_writes,
        "applied batched writes"
    );
    Ok(report)
}

/// Pending updates for one sheet with an automatic-flush threshold.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    pending: Vec<CellUpdate>,
    threshold: usize,
}

impl WriteBatch {
    pub fn new(threshold: usize) -> Self {
        Self { pending: Vec::new(), threshold: threshold.max(1) }
    }

    /// Queues an update. Returns true once the threshold is reached.
    pub fn push(&mut self, update: CellUpdate) -> bool {
        self.pending.push(update);
        self.pending.len() >= self.threshold
    }

    /// Drains the pending updates in insertion order.
    pub fn take(&mut self) -> Vec<CellUpdate> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::store::{FailureKind, MemoryStore, StoreCall, StoreOp, text_row};

    fn v(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_contiguous_run_and_single_cell() {
        let updates = [CellUpdate::new(5, 2, "a"), CellUpdate::new(5, 3, "b"), CellUpdate::new(5, 5, "c")];
        let ops = RowRunStrategy.plan(&updates);
        assert_eq!(
            ops,
            vec![
                WriteOp::Range { row: 5, col: 2, values: vec![v("a"), v("b")] },
                WriteOp::Cell { row: 5, col: 5, value: v("c") },
            ]
        );
    }

    #[test]
    fn test_scattered_columns_are_cell_writes() {
        let updates = [CellUpdate::new(4, 1, "a"), CellUpdate::new(4, 3, "b"), CellUpdate::new(4, 5, "c")];
        let ops = RowRunStrategy.plan(&updates);
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().all(|op| matches!(op, WriteOp::Cell { .. })));
    }

    #[test]
    fn test_single_column_is_cell_write() {
        let ops = RowRunStrategy.plan(&[CellUpdate::new(2, 4, "x")]);
        assert_eq!(ops, vec![WriteOp::Cell { row: 2, col: 4, value: v("x") }]);
    }

    #[test]
    fn test_contiguous_row_is_one_range() {
        let updates = [CellUpdate::new(3, 4, "c"), CellUpdate::new(3, 2, "a"), CellUpdate::new(3, 3, "b")];
        let ops = RowRunStrategy.plan(&updates);
        assert_eq!(ops, vec![WriteOp::Range { row: 3, col: 2, values: vec![v("a"), v("b"), v("c")] }]);
    }

    #[test]
    fn test_last_write_wins_per_cell() {
        let updates = [CellUpdate::new(2, 1, "old"), CellUpdate::new(2, 2, "b"), CellUpdate::new(2, 1, "new")];
        let ops = RowRunStrategy.plan(&updates);
        assert_eq!(ops, vec![WriteOp::Range { row: 2, col: 1, values: vec![v("new"), v("b")] }]);

        let ops = PerCellStrategy.plan(&updates);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], WriteOp::Cell { row: 2, col: 1, value: v("new") });
    }

    #[test]
    fn test_rows_planned_in_ascending_order() {
        let updates = [CellUpdate::new(9, 1, "z"), CellUpdate::new(2, 1, "a")];
        let rows: Vec<usize> = RowRunStrategy.plan(&updates).iter().map(WriteOp::row).collect();
        assert_eq!(rows, vec![2, 9]);
    }

    #[test]
    fn test_strategy_for_config() {
        assert_eq!(strategy_for(WriteStrategyKind::RowRuns).name(), "row_runs");
        assert_eq!(strategy_for(WriteStrategyKind::PerCell).name(), "per_cell");
    }

    fn sheet_store() -> MemoryStore {
        MemoryStore::new().with_sheet("Requests", vec![text_row(&["A", "B", "C", "D", "E"])])
    }

    #[tokio::test]
    async fn test_apply_issues_planned_writes_then_one_flush() {
        let store = sheet_store();
        let updates = [
            CellUpdate::new(5, 2, "a"),
            CellUpdate::new(5, 3, "b"),
            CellUpdate::new(6, 5, "c"),
        ];
        let report = apply_updates(&store, "Requests", &updates, &RowRunStrategy).await.unwrap();

        assert_eq!(report, ApplyReport { updates: 3, cell_writes: 1, range_writes: 1, rows: 2 });
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::WriteRange { sheet: "Requests".into(), row: 5, col: 2, width: 2 },
                StoreCall::WriteCell { sheet: "Requests".into(), row: 6, col: 5 },
                StoreCall::Flush,
            ]
        );
        assert_eq!(store.snapshot("Requests").unwrap()[4][1], v("a"));
    }

    #[tokio::test]
    async fn test_apply_empty_makes_no_calls() {
        let store = sheet_store();
        let report = apply_updates(&store, "Requests", &[], &RowRunStrategy).await.unwrap();
        assert_eq!(report, ApplyReport::default());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_apply_rejects_zero_coordinates_before_writing() {
        let store = sheet_store();
        let updates = [CellUpdate::new(2, 1, "a"), CellUpdate::new(0, 1, "b")];
        let result = apply_updates(&store, "Requests", &updates, &RowRunStrategy).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_apply_rejects_far_coordinates_before_writing() {
        let store = sheet_store();
        let updates = [CellUpdate::new(2, 1, "a"), CellUpdate::new(usize::MAX / 2, 1, "b")];
        let result = apply_updates(&store, "Requests", &updates, &RowRunStrategy).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.calls().is_empty());
        assert_eq!(store.snapshot("Requests").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_failure_propagates_and_keeps_earlier_rows() {
        let store = sheet_store();
        store.fail_after(StoreOp::WriteCell, 1, FailureKind::RateLimited);
        let updates = [CellUpdate::new(2, 1, "first"), CellUpdate::new(3, 1, "second")];

        let result = apply_updates(&store, "Requests", &updates, &RowRunStrategy).await;
        match result {
            Err(Error::WriteFailed { sheet, row, source }) => {
                assert_eq!(sheet, "Requests");
                assert_eq!(row, 3);
                assert!(matches!(*source, Error::RateLimited(_)));
            }
            other => panic!("expected WriteFailed, got {other:?}"),
        }

        assert_eq!(store.snapshot("Requests").unwrap()[1][0], v("first"));
        assert_eq!(store.call_count(StoreOp::Flush), 0);
    }

    #[tokio::test]
    async fn test_apply_flush_failure_propagates() {
        let store = sheet_store();
        store.fail_on(StoreOp::Flush, FailureKind::PermissionDenied);
        let result = apply_updates(&store, "Requests", &[CellUpdate::new(2, 1, "a")], &PerCellStrategy).await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));
    }

    #[test]
    fn test_write_batch_threshold() {
        let mut batch = WriteBatch::new(2);
        assert!(!batch.push(CellUpdate::new(2, 1, "a")));
        assert!(batch.push(CellUpdate::new(2, 2, "b")));
        assert_eq!(batch.take().len(), 2);
        assert!(batch.is_empty());
    }
}
