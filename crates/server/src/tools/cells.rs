//! Write tools: cells_update, row_append.
//!
//! Both invalidate the table's cached data, including after a failed write.

use std::collections::BTreeMap;

use dispatch_client::{ApplyReport, CellUpdate, DataContext, TableKind};
use dispatch_core::{CellValue, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the cells_update tool.
///
/// Give either `updates`, or `row` with `fields`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CellsUpdateParams {
    pub table: TableKind,

    /// Cell updates in 1-based sheet coordinates (row 1 is the header).
    #[serde(default)]
    pub updates: Vec<CellUpdate>,

    /// Sheet row to update by column name.
    #[serde(default)]
    pub row: Option<usize>,

    /// Column name -> new value, applied to `row`.
    #[serde(default)]
    pub fields: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CellsUpdateOutput {
    pub table: TableKind,
    /// The write strategy that planned the store calls.
    pub strategy: String,
    pub report: ApplyReport,
}

/// Parameters for the row_append tool.
///
/// Give either positional `values`, or `fields` by column name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RowAppendParams {
    pub table: TableKind,

    #[serde(default)]
    pub values: Vec<CellValue>,

    #[serde(default)]
    pub fields: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RowAppendOutput {
    pub table: TableKind,
    /// 1-based sheet row of the appended row.
    pub sheet_row: usize,
}

pub async fn update_impl(ctx: &mut DataContext, params: CellsUpdateParams) -> Result<CallToolResult, McpError> {
    let by_name = !params.fields.is_empty();
    if by_name == !params.updates.is_empty() {
        return Err(Error::InvalidInput("give either updates, or row with fields".to_string()).into());
    }

    let report = if by_name {
        let row = params
            .row
            .ok_or_else(|| Error::InvalidInput("row is required with fields".to_string()))?;
        let fields: Vec<(&str, CellValue)> = params
            .fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();
        ctx.update_fields(params.table, row, &fields).await?
    } else {
        let mut report = ApplyReport::default();
        for update in params.updates {
            if let Some(flushed) = ctx.queue_update(params.table, update).await? {
                report.absorb(flushed);
            }
        }
        report.absorb(ctx.flush_pending().await?);
        report
    };

    tracing::info!(table = ?params.table, updates = report.updates, store_calls = report.store_calls(), "cells updated");
    json_result(&CellsUpdateOutput { table: params.table, strategy: ctx.strategy_name().to_string(), report })
}

pub async fn append_impl(ctx: &mut DataContext, params: RowAppendParams) -> Result<CallToolResult, McpError> {
    let by_name = !params.fields.is_empty();
    if by_name == !params.values.is_empty() {
        return Err(Error::InvalidInput("give either values or fields".to_string()).into());
    }

    let values = if by_name {
        let table = ctx.table(params.table).await;
        let mut values = vec![CellValue::Empty; table.header.width()];
        for (name, value) in params.fields {
            let offset = table.header.require(&table.sheet, &name)?;
            values[offset] = value;
        }
        values
    } else {
        params.values
    };

    let sheet_row = ctx.append_row(params.table, values).await?;
    json_result(&RowAppendOutput { table: params.table, sheet_row })
}

#[cfg(test)]
mod tests {
    use dispatch_core::store::{FailureKind, StoreOp};

    use super::*;
    use crate::tools::testing::{context, output, workbook};

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, CellValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn test_update_by_coordinates_coalesces() {
        let store = workbook();
        let mut ctx = context(&store);
        let params = CellsUpdateParams {
            table: TableKind::Requests,
            updates: vec![CellUpdate::new(2, 3, "Library"), CellUpdate::new(2, 4, "Assigned")],
            row: None,
            fields: BTreeMap::new(),
        };

        let updated = output(&update_impl(&mut ctx, params).await.unwrap());
        assert_eq!(updated["strategy"], "row_runs");
        assert_eq!(updated["report"]["range_writes"], 1);
        assert_eq!(updated["report"]["cell_writes"], 0);
        assert_eq!(store.call_count(StoreOp::Flush), 1);
    }

    #[tokio::test]
    async fn test_update_by_field_names_is_visible_to_reads() {
        let store = workbook();
        let mut ctx = context(&store);
        assert_eq!(ctx.active_rider_count().await, 1);

        let params = CellsUpdateParams {
            table: TableKind::Riders,
            updates: Vec::new(),
            row: Some(3),
            fields: fields(&[("Status", "Active")]),
        };
        update_impl(&mut ctx, params).await.unwrap();
        assert_eq!(ctx.active_rider_count().await, 2);
    }

    #[tokio::test]
    async fn test_update_rejects_ambiguous_or_unknown() {
        let store = workbook();
        let mut ctx = context(&store);

        let empty = CellsUpdateParams { table: TableKind::Riders, updates: Vec::new(), row: None, fields: BTreeMap::new() };
        assert!(update_impl(&mut ctx, empty).await.is_err());

        let no_row = CellsUpdateParams {
            table: TableKind::Riders,
            updates: Vec::new(),
            row: None,
            fields: fields(&[("Status", "Active")]),
        };
        assert!(update_impl(&mut ctx, no_row).await.is_err());

        let unknown = CellsUpdateParams {
            table: TableKind::Riders,
            updates: Vec::new(),
            row: Some(2),
            fields: fields(&[("Shoe Size", "9")]),
        };
        let err = update_impl(&mut ctx, unknown).await.unwrap_err();
        assert_eq!(err.code.0, -32024);
    }

    #[tokio::test]
    async fn test_update_by_field_names_refuses_header_row() {
        let store = workbook();
        let mut ctx = context(&store);
        let params = CellsUpdateParams {
            table: TableKind::Riders,
            updates: Vec::new(),
            row: Some(1),
            fields: fields(&[("Status", "Active")]),
        };
        let err = update_impl(&mut ctx, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(store.snapshot("Riders").unwrap()[0][2], CellValue::from("Status"));
    }

    #[tokio::test]
    async fn test_update_write_failure_maps_to_error_code() {
        let store = workbook();
        let mut ctx = context(&store);
        store.fail_on(StoreOp::WriteCell, FailureKind::RateLimited);

        let params = CellsUpdateParams {
            table: TableKind::Riders,
            updates: vec![CellUpdate::new(2, 3, "Inactive")],
            row: None,
            fields: BTreeMap::new(),
        };
        let err = update_impl(&mut ctx, params).await.unwrap_err();
        assert_eq!(err.code.0, -32025);
    }

    #[tokio::test]
    async fn test_append_by_fields() {
        let store = workbook();
        let mut ctx = context(&store);
        let params = RowAppendParams {
            table: TableKind::Riders,
            values: Vec::new(),
            fields: fields(&[("Full Name", "Dee Fox"), ("Rider ID", "R3"), ("Status", "Active")]),
        };

        let appended = output(&append_impl(&mut ctx, params).await.unwrap());
        assert_eq!(appended["sheet_row"], 4);

        let rider = ctx.find_rider("R3").await.unwrap();
        assert_eq!(rider.name, "Dee Fox");
        assert_eq!(ctx.active_rider_count().await, 2);
    }

    #[tokio::test]
    async fn test_append_by_values_and_missing_input() {
        let store = workbook();
        let mut ctx = context(&store);
        let params = RowAppendParams {
            table: TableKind::Settings,
            values: vec![CellValue::from("dispatch_email"), CellValue::from("ops@example.org")],
            fields: BTreeMap::new(),
        };
        append_impl(&mut ctx, params).await.unwrap();
        assert_eq!(ctx.setting("dispatch_email").await.as_deref(), Some("ops@example.org"));

        let empty = RowAppendParams { table: TableKind::Settings, values: Vec::new(), fields: BTreeMap::new() };
        assert!(append_impl(&mut ctx, empty).await.is_err());
    }
}
