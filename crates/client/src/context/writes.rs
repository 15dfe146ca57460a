//! Writes and their cache invalidation.
//!
//! Every write invalidates the table's cached rows (and what depends on them)
//! whether or not it succeeded, since a failed batch may be partly applied.

use dispatch_core::{CellValue, Error};

use super::{DataContext, TableKind};
use crate::batch::{ApplyReport, CellUpdate, WriteBatch, apply_updates};

impl DataContext {
    /// Applies `updates` through the configured strategy, then flushes.
    ///
    /// # Errors
    ///
    /// Propagates [`apply_updates`] errors; earlier writes stay applied.
    pub async fn update_cells(&mut self, kind: TableKind, updates: &[CellUpdate]) -> Result<ApplyReport, Error> {
        let sheet = self.sheet(kind);
        let result = apply_updates(self.store.as_ref(), &sheet, updates, self.strategy.as_ref()).await;
        if !updates.is_empty() {
            self.invalidate(kind);
        }
        result
    }

    /// Updates named columns of one data row. Row 1 is the header and cannot
    /// be addressed by name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a row below 2, [`Error::UnknownColumn`] when
    /// a name is not in the header. Nothing is written in either case.
    pub async fn update_fields(
        &mut self, kind: TableKind, sheet_row: usize, fields: &[(&str, CellValue)],
    ) -> Result<ApplyReport, Error> {
        if sheet_row < 2 {
            return Err(Error::InvalidInput(format!("row {sheet_row} is not a data row; data starts at row 2")));
        }
        let table = self.table(kind).await;
        let updates = fields
            .iter()
            .map(|(column, value)| {
                let offset = table.header.require(&table.sheet, column)?;
                Ok(CellUpdate { row: sheet_row, col: offset + 1, value: value.clone() })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        self.update_cells(kind, &updates).await
    }

    /// Queues an update for `kind`, flushing that table once the batch
    /// threshold is reached.
    ///
    /// Returns the flush report when a flush happened.
    pub async fn queue_update(&mut self, kind: TableKind, update: CellUpdate) -> Result<Option<ApplyReport>, Error> {
        let threshold = self.config.write.batch_threshold;
        let full = self
            .pending
            .entry(kind)
            .or_insert_with(|| WriteBatch::new(threshold))
            .push(update);
        if !full {
            return Ok(None);
        }

        tracing::debug!(table = ?kind, threshold, "batch threshold reached; flushing");
        self.flush_table(kind).await.map(Some)
    }

    /// Flushes every table's pending updates, in table order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed table; later tables keep their pending updates.
    pub async fn flush_pending(&mut self) -> Result<ApplyReport, Error> {
        let mut report = ApplyReport::default();
        for kind in TableKind::ALL {
            report.absorb(self.flush_table(kind).await?);
        }
        Ok(report)
    }

    async fn flush_table(&mut self, kind: TableKind) -> Result<ApplyReport, Error> {
        let updates = match self.pending.get_mut(&kind) {
            Some(batch) if !batch.is_empty() => batch.take(),
            _ => return Ok(ApplyReport::default()),
        };
        self.update_cells(kind, &updates).await
    }

    /// Appends a row after the last populated one. Returns its row number.
    pub async fn append_row(&mut self, kind: TableKind, values: Vec<CellValue>) -> Result<usize, Error> {
        let sheet = self.sheet(kind);
        let result = self.store.append_row(&sheet, values).await;
        self.invalidate(kind);
        match result {
            Ok(row) => {
                tracing::debug!(sheet = %sheet, row, "appended row");
                Ok(row)
            }
            Err(e) => {
                tracing::error!(sheet = %sheet, error = %e, "append failed");
                Err(e)
            }
        }
    }

    /// Creates any missing sheet with its configured header row.
    ///
    /// Returns the names of the sheets that were created.
    pub async fn ensure_sheets(&mut self) -> Result<Vec<String>, Error> {
        let mut created = Vec::new();
        for kind in TableKind::ALL {
            let sheet = self.sheet(kind);
            let header = kind.header(&self.config.sheets);
            if self.store.get_or_create_sheet(&sheet, &header).await? {
                tracing::info!(sheet = %sheet, "created sheet");
                self.invalidate(kind);
                created.push(sheet);
            }
        }
        Ok(created)
    }
}
