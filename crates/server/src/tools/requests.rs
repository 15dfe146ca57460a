//! Request tools: request_find, assignments_for_request.

use std::collections::BTreeMap;

use dispatch_client::{DataContext, TableKind};
use dispatch_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters shared by the request tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestIdParams {
    /// The Request ID, matched exactly after trimming.
    pub request_id: String,
}

impl RequestIdParams {
    fn validate(&self) -> Result<(), Error> {
        if self.request_id.trim().is_empty() {
            return Err(Error::InvalidInput("request_id must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RequestFindOutput {
    /// 1-based sheet row of the request, if found.
    pub sheet_row: Option<usize>,
    /// The request as column name -> text.
    pub request: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AssignmentsOutput {
    pub count: usize,
    pub assignments: Vec<BTreeMap<String, String>>,
}

pub async fn request_find_impl(ctx: &mut DataContext, params: RequestIdParams) -> Result<CallToolResult, McpError> {
    params.validate()?;

    let output = match ctx.find_request(&params.request_id).await {
        Some(record) => RequestFindOutput {
            sheet_row: Some(record.sheet_row),
            request: Some(ctx.row_object(TableKind::Requests, &record).await),
        },
        None => RequestFindOutput { sheet_row: None, request: None },
    };
    json_result(&output)
}

pub async fn assignments_impl(ctx: &mut DataContext, params: RequestIdParams) -> Result<CallToolResult, McpError> {
    params.validate()?;

    let mut assignments = Vec::new();
    for record in ctx.assignments_for_request(&params.request_id).await {
        assignments.push(ctx.row_object(TableKind::Assignments, &record).await);
    }
    json_result(&AssignmentsOutput { count: assignments.len(), assignments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, output, workbook};

    fn params(id: &str) -> RequestIdParams {
        RequestIdParams { request_id: id.to_string() }
    }

    #[tokio::test]
    async fn test_request_find() {
        let store = workbook();
        let mut ctx = context(&store);

        let found = output(&request_find_impl(&mut ctx, params(" A-100 ")).await.unwrap());
        assert_eq!(found["sheet_row"], 2);
        assert_eq!(found["request"]["Requester"], "City Hall");

        let missing = output(&request_find_impl(&mut ctx, params("A-404")).await.unwrap());
        assert!(missing["request"].is_null());
    }

    #[tokio::test]
    async fn test_assignments_for_request() {
        let store = workbook();
        let mut ctx = context(&store);

        let listed = output(&assignments_impl(&mut ctx, params("A-100")).await.unwrap());
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["assignments"][0]["Rider Name"], "Ann Lee");

        assert!(assignments_impl(&mut ctx, params("")).await.is_err());
    }
}
