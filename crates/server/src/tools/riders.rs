//! Rider tools: riders_list, rider_find, rider_active_count.

use std::collections::BTreeMap;

use dispatch_client::{DataContext, RiderEntry, TableKind};
use dispatch_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the riders_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RidersListParams {
    /// Only riders whose status is one of the configured active statuses.
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RidersListOutput {
    pub count: usize,
    pub riders: Vec<RiderEntry>,
}

/// Parameters for the rider_find tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RiderFindParams {
    /// Rider ID (exact) or full name (case-insensitive).
    pub query: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RiderFindOutput {
    /// The matching rider, if any.
    pub rider: Option<RiderEntry>,
    /// Assignment rows for the rider, as column name -> text.
    pub assignments: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ActiveCountOutput {
    pub active: usize,
    pub active_statuses: Vec<String>,
}

pub async fn list_impl(ctx: &mut DataContext, params: RidersListParams) -> Result<CallToolResult, McpError> {
    let index = ctx.riders().await;
    let statuses = &ctx.config().sheets.riders.active_statuses;
    let riders: Vec<RiderEntry> = index
        .riders()
        .iter()
        .filter(|r| !params.active_only || r.is_active(statuses))
        .cloned()
        .collect();

    json_result(&RidersListOutput { count: riders.len(), riders })
}

pub async fn find_impl(ctx: &mut DataContext, params: RiderFindParams) -> Result<CallToolResult, McpError> {
    if params.query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".to_string()).into());
    }

    let Some(rider) = ctx.find_rider(&params.query).await else {
        tracing::debug!(query = %params.query, "rider not found");
        return json_result(&RiderFindOutput { rider: None, assignments: Vec::new() });
    };

    let mut assignments = Vec::new();
    for record in ctx.assignments_for_rider(&rider.name).await {
        assignments.push(ctx.row_object(TableKind::Assignments, &record).await);
    }
    json_result(&RiderFindOutput { rider: Some(rider), assignments })
}

pub async fn active_count_impl(ctx: &mut DataContext) -> Result<CallToolResult, McpError> {
    let active = ctx.active_rider_count().await;
    let active_statuses = ctx.config().sheets.riders.active_statuses.clone();
    json_result(&ActiveCountOutput { active, active_statuses })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, output, workbook};

    #[tokio::test]
    async fn test_list_all_and_active() {
        let store = workbook();
        let mut ctx = context(&store);

        let all = output(&list_impl(&mut ctx, RidersListParams::default()).await.unwrap());
        assert_eq!(all["count"], 2);

        let active = output(&list_impl(&mut ctx, RidersListParams { active_only: true }).await.unwrap());
        assert_eq!(active["count"], 1);
        assert_eq!(active["riders"][0]["name"], "Ann Lee");
    }

    #[tokio::test]
    async fn test_find_includes_assignments() {
        let store = workbook();
        let mut ctx = context(&store);
        let params = RiderFindParams { query: "ann lee".into() };

        let found = output(&find_impl(&mut ctx, params).await.unwrap());
        assert_eq!(found["rider"]["id"], "R1");
        assert_eq!(found["assignments"][0]["Request ID"], "A-100");
    }

    #[tokio::test]
    async fn test_find_miss_and_blank_query() {
        let store = workbook();
        let mut ctx = context(&store);

        let missing = output(&find_impl(&mut ctx, RiderFindParams { query: "Zed".into() }).await.unwrap());
        assert!(missing["rider"].is_null());

        let result = find_impl(&mut ctx, RiderFindParams { query: "  ".into() }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_active_count() {
        let store = workbook();
        let mut ctx = context(&store);
        let counted = output(&active_count_impl(&mut ctx).await.unwrap());
        assert_eq!(counted["active"], 1);
        assert_eq!(counted["active_statuses"][0], "Active");
    }
}
