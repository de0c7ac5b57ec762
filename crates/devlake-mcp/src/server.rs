//! MCP server implementation

use std::fmt;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler as RmcpServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::SERVER_INSTRUCTIONS;
use crate::dispatch::Dispatcher;
use crate::dispatch::tools::{
    CONNECT_DATABASE, EXECUTE_QUERY, GET_SECURITY_STATS, GET_TABLE_SCHEMA, HEALTH_CHECK,
    LIST_DATABASES, LIST_TABLES,
};
use crate::session::ChannelId;
use crate::types::{
    ExecuteQueryParams, GetTableSchemaParams, ListTablesParams, ToolResponse, ToolResult,
};
use crate::Error;

/// rmcp handler bound to one caller channel
pub struct ServerHandler {
    dispatcher: Dispatcher,
    channel: ChannelId,
    tool_router: ToolRouter<Self>,
}

impl Clone for ServerHandler {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            channel: self.channel.clone(),
            tool_router: Self::tool_router(),
        }
    }
}

impl fmt::Debug for ServerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandler")
            .field("channel", &self.channel)
            .field("dispatcher", &"<Dispatcher>")
            .field("tool_router", &"<ToolRouter>")
            .finish()
    }
}

impl ServerHandler {
    pub fn new(dispatcher: Dispatcher, channel: ChannelId) -> Self {
        dispatcher.open_channel(&channel);
        Self {
            dispatcher,
            channel,
            tool_router: Self::tool_router(),
        }
    }

    #[must_use]
    pub const fn channel(&self) -> &ChannelId {
        &self.channel
    }

    async fn call(&self, tool: &str, arguments: Map<String, Value>) -> ToolResult<ToolResponse> {
        Ok(Json(
            self.dispatcher
                .dispatch(&self.channel, tool, arguments)
                .await,
        ))
    }

    async fn call_with<P: Serialize>(&self, tool: &str, params: &P) -> ToolResult<ToolResponse> {
        match serde_json::to_value(params) {
            Ok(Value::Object(arguments)) => self.call(tool, arguments).await,
            Ok(_) => Ok(Json(ToolResponse::failure(&Error::InvalidArguments(
                "arguments must be an object".into(),
            )))),
            Err(e) => Ok(Json(ToolResponse::failure(&Error::InvalidArguments(
                e.to_string(),
            )))),
        }
    }
}

#[tool_router]
impl ServerHandler {
    #[tool(description = "Verify the connection to the DevLake database and report server version and latency")]
    async fn connect_database(&self) -> ToolResult<ToolResponse> {
        self.call(CONNECT_DATABASE, Map::new()).await
    }

    #[tool(description = "List the databases available to query")]
    async fn list_databases(&self) -> ToolResult<ToolResponse> {
        self.call(LIST_DATABASES, Map::new()).await
    }

    #[tool(description = "List the tables and views in a database")]
    async fn list_tables(
        &self,
        Parameters(params): Parameters<ListTablesParams>,
    ) -> ToolResult<ToolResponse> {
        self.call_with(LIST_TABLES, &params).await
    }

    #[tool(description = "Get column definitions for a table")]
    async fn get_table_schema(
        &self,
        Parameters(params): Parameters<GetTableSchemaParams>,
    ) -> ToolResult<ToolResponse> {
        self.call_with(GET_TABLE_SCHEMA, &params).await
    }

    #[tool(
        description = "Execute a single read-only SELECT query. Results are row-limited (default 100, maximum 1000) and sensitive values are masked"
    )]
    async fn execute_query(
        &self,
        Parameters(params): Parameters<ExecuteQueryParams>,
    ) -> ToolResult<ToolResponse> {
        self.call_with(EXECUTE_QUERY, &params).await
    }

    #[tool(description = "Return query and rejection counters and the number of active sessions")]
    async fn get_security_stats(&self) -> ToolResult<ToolResponse> {
        self.call(GET_SECURITY_STATS, Map::new()).await
    }

    #[tool(description = "Report database health, probe latency and connection pool usage")]
    async fn health_check(&self) -> ToolResult<ToolResponse> {
        self.call(HEALTH_CHECK, Map::new()).await
    }
}

#[tool_handler]
impl RmcpServerHandler for ServerHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_instructions(SERVER_INSTRUCTIONS)
    }
}
