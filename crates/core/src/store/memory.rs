//! In-process tabular store.
//!
//! Sheets live in a `HashMap` behind a mutex. Every call is recorded so
//! callers can assert how many store round-trips an operation cost, and a
//! failure can be armed per operation to simulate quota or permission errors.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{CellValue, RangeSpec, Table, TabularStore, check_coords, check_range, check_span};
use crate::Error;

/// Kind of store operation, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ReadAll,
    ReadRange,
    WriteCell,
    WriteRange,
    AppendRow,
    Flush,
    GetOrCreateSheet,
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ReadAll { sheet: String },
    ReadRange { sheet: String, range: RangeSpec },
    WriteCell { sheet: String, row: usize, col: usize },
    WriteRange { sheet: String, row: usize, col: usize, width: usize },
    AppendRow { sheet: String },
    Flush,
    GetOrCreateSheet { sheet: String },
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreCall::ReadAll { .. } => StoreOp::ReadAll,
            StoreCall::ReadRange { .. } => StoreOp::ReadRange,
            StoreCall::WriteCell { .. } => StoreOp::WriteCell,
            StoreCall::WriteRange { .. } => StoreOp::WriteRange,
            StoreCall::AppendRow { .. } => StoreOp::AppendRow,
            StoreCall::Flush => StoreOp::Flush,
            StoreCall::GetOrCreateSheet { .. } => StoreOp::GetOrCreateSheet,
        }
    }
}

/// Simulated store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    RateLimited,
}

impl FailureKind {
    fn to_error(self, op: StoreOp) -> Error {
        match self {
            FailureKind::PermissionDenied => Error::PermissionDenied(format!("{op:?} denied")),
            FailureKind::RateLimited => Error::RateLimited(format!("{op:?} quota exceeded")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ArmedFailure {
    kind: FailureKind,
    /// Calls of this op that still succeed before the failure fires.
    remaining_ok: usize,
}

#[derive(Debug, Default)]
struct Inner {
    sheets: HashMap<String, Table>,
    calls: Vec<StoreCall>,
    failures: HashMap<StoreOp, ArmedFailure>,
}

impl Inner {
    /// Records the call, then fires an armed failure if one is due.
    fn enter(&mut self, call: StoreCall) -> Result<(), Error> {
        let op = call.op();
        self.calls.push(call);
        if let Some(armed) = self.failures.get_mut(&op) {
            if armed.remaining_ok == 0 {
                return Err(armed.kind.to_error(op));
            }
            armed.remaining_ok -= 1;
        }
        Ok(())
    }

    fn sheet_mut(&mut self, sheet: &str) -> Result<&mut Table, Error> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))
    }

    fn set_cell(&mut self, sheet: &str, row: usize, col: usize, value: CellValue) -> Result<(), Error> {
        let table = self.sheet_mut(sheet)?;
        if table.len() < row {
            table.resize_with(row, Vec::new);
        }
        let cells = &mut table[row - 1];
        if cells.len() < col {
            cells.resize(col, CellValue::Empty);
        }
        cells[col - 1] = value;
        Ok(())
    }
}

/// In-memory [`TabularStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a sheet with the given contents.
    pub fn with_sheet(self, name: &str, table: Table) -> Self {
        self.lock().sheets.insert(name.to_string(), table);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent call of `op` fail with `kind`.
    pub fn fail_on(&self, op: StoreOp, kind: FailureKind) {
        self.fail_after(op, 0, kind);
    }

    /// Lets `successes` calls of `op` through, then fails every later one.
    pub fn fail_after(&self, op: StoreOp, successes: usize, kind: FailureKind) {
        self.lock().failures.insert(op, ArmedFailure { kind, remaining_ok: successes });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// All calls recorded so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: StoreOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Raw contents of a sheet, bypassing the call log.
    pub fn snapshot(&self, sheet: &str) -> Option<Table> {
        self.lock().sheets.get(sheet).cloned()
    }
}

fn pad_rows(table: &Table) -> Table {
    let width = table.iter().map(Vec::len).max().unwrap_or(0);
    let last = table.iter().rposition(|row| row.iter().any(|c| *c != CellValue::Empty));
    let Some(last) = last else {
        return Vec::new();
    };
    table[..=last]
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.resize(width, CellValue::Empty);
            row
        })
        .collect()
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_all(&self, sheet: &str) -> Result<Table, Error> {
        let mut inner = self.lock();
        inner.enter(StoreCall::ReadAll { sheet: sheet.to_string() })?;
        let table = inner.sheet_mut(sheet)?;
        Ok(pad_rows(table))
    }

    async fn read_range(&self, sheet: &str, range: RangeSpec) -> Result<Table, Error> {
        let mut inner = self.lock();
        inner.enter(StoreCall::ReadRange { sheet: sheet.to_string(), range })?;
        check_range(&range)?;
        let table = inner.sheet_mut(sheet)?;

        let block = (range.row..=range.last_row())
            .map(|r| {
                (range.col..=range.last_col())
                    .map(|c| {
                        table
                            .get(r - 1)
                            .and_then(|cells| cells.get(c - 1))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Ok(block)
    }

    async fn write_cell(&self, sheet: &str, row: usize, col: usize, value: CellValue) -> Result<(), Error> {
        let mut inner = self.lock();
        inner.enter(StoreCall::WriteCell { sheet: sheet.to_string(), row, col })?;
        check_coords(row, col)?;
        inner.set_cell(sheet, row, col, value)
    }

    async fn write_range(&self, sheet: &str, row: usize, col: usize, values: Vec<CellValue>) -> Result<(), Error> {
        let mut inner = self.lock();
        inner.enter(StoreCall::WriteRange { sheet: sheet.to_string(), row, col, width: values.len() })?;
        check_span(row, col, values.len())?;
        inner.sheet_mut(sheet)?;
        for (i, value) in values.into_iter().enumerate() {
            inner.set_cell(sheet, row, col + i, value)?;
        }
        Ok(())
    }

    async fn append_row(&self, sheet: &str, values: Vec<CellValue>) -> Result<usize, Error> {
        let mut inner = self.lock();
        inner.enter(StoreCall::AppendRow { sheet: sheet.to_string() })?;
        let table = inner.sheet_mut(sheet)?;
        let row = pad_rows(table).len() + 1;
        check_span(row, 1, values.len())?;
        table.truncate(row - 1);
        table.push(values);
        Ok(row)
    }

    async fn flush(&self) -> Result<(), Error> {
        self.lock().enter(StoreCall::Flush)
    }

    async fn get_or_create_sheet(&self, sheet: &str, header: &[String]) -> Result<bool, Error> {
        let mut inner = self.lock();
        inner.enter(StoreCall::GetOrCreateSheet { sheet: sheet.to_string() })?;
        if inner.sheets.contains_key(sheet) {
            return Ok(false);
        }
        let header_row = header.iter().map(|h| CellValue::from(h.as_str())).collect();
        inner.sheets.insert(sheet.to_string(), vec![header_row]);
        Ok(true)
    }
}
