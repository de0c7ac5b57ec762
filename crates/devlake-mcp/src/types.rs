//! Type definitions for MCP tools

use rmcp::handler::server::wrapper::Json;
use rmcp::ErrorData;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::security::MaskedResult;
use crate::Error;

/// Result type for MCP tool handlers returning structured JSON data
pub type ToolResult<T> = Result<Json<T>, ErrorData>;

/// Caller-visible error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolError {
    /// Error category, e.g. `ForbiddenKeyword` or `PoolExhausted`
    #[schemars(description = "Error category, e.g. ForbiddenKeyword, PoolExhausted, Timeout")]
    pub category: String,
    #[schemars(description = "Human-readable error message")]
    pub message: String,
}

impl From<&Error> for ToolError {
    fn from(err: &Error) -> Self {
        Self {
            category: err.category().to_string(),
            message: err.caller_message(),
        }
    }
}

/// Response returned by every tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    #[schemars(description = "Whether the call succeeded")]
    pub success: bool,
    #[schemars(description = "Number of rows returned")]
    pub row_count: usize,
    /// Masked rows, one JSON object per row
    #[schemars(description = "Result rows as JSON objects keyed by column name")]
    pub rows: Vec<Map<String, Value>>,
    #[schemars(description = "True when more rows existed than the effective row limit")]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Present when success is false")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    #[must_use]
    pub fn from_result(result: MaskedResult) -> Self {
        Self {
            success: true,
            row_count: result.row_count(),
            rows: result.rows,
            truncated: result.truncated,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            row_count: 0,
            rows: Vec::new(),
            truncated: false,
            error: Some(ToolError::from(err)),
        }
    }
}

/// Parameters for listing tables
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListTablesParams {
    #[schemars(description = "Database to list tables from. Example: 'lake'")]
    pub database: String,
}

/// Parameters for describing a table
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetTableSchemaParams {
    #[schemars(description = "Database containing the table. Example: 'lake'")]
    pub database: String,
    #[schemars(description = "Table to describe. Example: 'incidents'")]
    pub table: String,
}

/// Parameters for SQL query execution
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteQueryParams {
    #[schemars(description = "A single read-only SELECT statement")]
    pub query: String,
    /// Optional row limit; capped by the server maximum
    #[serde(default)]
    #[schemars(
        description = "Optional row limit (default 100). The server never returns more than its maximum (1000)"
    )]
    pub limit: Option<u32>,
}

/// Tools that take no arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NoParams {}
