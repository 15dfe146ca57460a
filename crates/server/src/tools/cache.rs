//! Cache tools: cache_invalidate, cache_stats.

use dispatch_client::{CacheStats, DataContext, TableKind};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the cache_invalidate tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateParams {
    /// Table to invalidate. Omit to drop every cached entry.
    #[serde(default)]
    pub table: Option<TableKind>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheInvalidateOutput {
    /// Keys removed. Empty when everything was cleared.
    pub removed: Vec<String>,
    pub cleared_all: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CacheStatsOutput {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub default_ttl_secs: u64,
    pub cascade_invalidation: bool,
    pub write_strategy: String,
    pub batch_threshold: usize,
}

pub fn invalidate_impl(ctx: &mut DataContext, params: CacheInvalidateParams) -> Result<CallToolResult, McpError> {
    let output = match params.table {
        Some(kind) => CacheInvalidateOutput { removed: ctx.invalidate(kind), cleared_all: false },
        None => {
            ctx.invalidate_all();
            CacheInvalidateOutput { removed: Vec::new(), cleared_all: true }
        }
    };
    tracing::info!(table = ?params.table, removed = output.removed.len(), "cache invalidated");
    json_result(&output)
}

pub fn stats_impl(ctx: &DataContext) -> Result<CallToolResult, McpError> {
    let config = ctx.config();
    let output = CacheStatsOutput {
        stats: ctx.cache_stats(),
        default_ttl_secs: config.cache.default_ttl_secs,
        cascade_invalidation: config.cache.cascade_invalidation,
        write_strategy: ctx.strategy_name().to_string(),
        batch_threshold: config.write.batch_threshold,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use dispatch_core::store::StoreOp;

    use super::*;
    use crate::tools::testing::{context, output, workbook};

    #[tokio::test]
    async fn test_invalidate_table_forces_reread() {
        let store = workbook();
        let mut ctx = context(&store);
        ctx.active_rider_count().await;

        let params = CacheInvalidateParams { table: Some(TableKind::Riders) };
        let invalidated = output(&invalidate_impl(&mut ctx, params).unwrap());
        assert_eq!(invalidated["removed"].as_array().unwrap().len(), 3);

        ctx.active_rider_count().await;
        assert_eq!(store.call_count(StoreOp::ReadAll), 2);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let store = workbook();
        let mut ctx = context(&store);
        ctx.table(TableKind::Requests).await;

        let invalidated = output(&invalidate_impl(&mut ctx, CacheInvalidateParams::default()).unwrap());
        assert_eq!(invalidated["cleared_all"], true);
        assert_eq!(ctx.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_stats_reports_counters_and_settings() {
        let store = workbook();
        let mut ctx = context(&store);
        ctx.table(TableKind::Requests).await;
        ctx.table(TableKind::Requests).await;

        let stats = output(&stats_impl(&ctx).unwrap());
        assert_eq!(stats["hits"], 1);
        assert_eq!(stats["misses"], 1);
        assert_eq!(stats["entries"], 1);
        assert_eq!(stats["default_ttl_secs"], 300);
        assert_eq!(stats["write_strategy"], "row_runs");
        assert_eq!(stats["batch_threshold"], 50);
    }
}
