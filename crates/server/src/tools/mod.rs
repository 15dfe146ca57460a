//! MCP tool implementations.
//!
//! Each `*_impl` takes the request's [`dispatch_client::DataContext`] and
//! returns pretty-printed JSON text content.

pub mod cache;
pub mod cells;
pub mod requests;
pub mod riders;

use dispatch_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Serializes `output` as the tool's single text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use dispatch_client::DataContext;
    use dispatch_core::store::{MemoryStore, text_row};
    use dispatch_core::AppConfig;
    use rmcp::model::CallToolResult;

    pub fn workbook() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::new()
                .with_sheet(
                    "Riders",
                    vec![
                        text_row(&["Full Name", "Rider ID", "Status", "Phone", "Email"]),
                        text_row(&["Ann Lee", "R1", "Active", "555-0101", ""]),
                        text_row(&["Bob Roy", "R2", "Inactive", "", ""]),
                    ],
                )
                .with_sheet(
                    "Requests",
                    vec![
                        text_row(&["Request ID", "Date", "Requester", "Status"]),
                        text_row(&["A-100", "2026-10-20", "City Hall", "New"]),
                    ],
                )
                .with_sheet(
                    "Assignments",
                    vec![
                        text_row(&["Assignment ID", "Request ID", "Rider Name", "Status"]),
                        text_row(&["AS-1", "A-100", "Ann Lee", "Assigned"]),
                    ],
                )
                .with_sheet("Settings", vec![text_row(&["Key", "Value"])]),
        )
    }

    pub fn context(store: &Arc<MemoryStore>) -> DataContext {
        DataContext::new(store.clone(), AppConfig::default())
    }

    /// The JSON carried by a tool result's text content.
    pub fn output(result: &CallToolResult) -> serde_json::Value {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
