//! Constants for the DevLake MCP server

/// Connectivity probe used by `connect_database`
pub const CONNECT_PROBE_QUERY: &str =
    "SELECT VERSION() AS version, DATABASE() AS current_database";

/// SQL query to list databases visible to the server account
pub const LIST_DATABASES_QUERY: &str =
    "SELECT SCHEMA_NAME AS database_name FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME";

/// Column holding the database name in [`LIST_DATABASES_QUERY`] results
pub const DATABASE_NAME_COLUMN: &str = "database_name";

/// SQL query template to list tables (use .replace("{DATABASE}", `database`))
pub const LIST_TABLES_TEMPLATE: &str = "SELECT TABLE_NAME AS table_name, TABLE_TYPE AS table_type FROM information_schema.TABLES WHERE TABLE_SCHEMA = '{DATABASE}' ORDER BY TABLE_NAME";

/// SQL query template to describe a table (use .replace("{DATABASE}",
/// database).replace("{TABLE}", table))
pub const TABLE_SCHEMA_TEMPLATE: &str = "SELECT COLUMN_NAME AS column_name, COLUMN_TYPE AS column_type, IS_NULLABLE AS is_nullable, COLUMN_KEY AS column_key, COLUMN_DEFAULT AS column_default, EXTRA AS extra, COLUMN_COMMENT AS column_comment FROM information_schema.COLUMNS WHERE TABLE_SCHEMA = '{DATABASE}' AND TABLE_NAME = '{TABLE}' ORDER BY ORDINAL_POSITION";

/// Connection status: success
pub const STATUS_CONNECTED: &str = "connected";

/// Server instructions sent during MCP initialization
pub const SERVER_INSTRUCTIONS: &str = "MCP server for a DevLake MySQL database. Provides read-only tools to explore databases and tables and to run SELECT queries. Results are row-limited and sensitive values such as emails and phone numbers are masked.";

pub const CONNECT_DATABASE_DESCRIPTION: &str = "Verify the connection to the DevLake database. Returns the server version, the current database and the probe latency. Call this first to make sure the database is reachable.";

pub const LIST_DATABASES_DESCRIPTION: &str = "List the databases available to query, such as the 'lake' database with incidents and deployments.";

pub const LIST_TABLES_DESCRIPTION: &str =
    "List the tables and views in a database, e.g. 'incidents' or 'cicd_deployments' in 'lake'.";

pub const GET_TABLE_SCHEMA_DESCRIPTION: &str = "Get column names, types, nullability, keys and comments for a table. Use it before writing a query against the table.";

pub const EXECUTE_QUERY_DESCRIPTION: &str = "Execute a read-only SQL SELECT query. Only a single SELECT statement is accepted; results are capped at the row limit (default 100, maximum 1000) and sensitive values are masked. Example: SELECT incident_key, status FROM lake.incidents WHERE status = 'DONE'";

pub const GET_SECURITY_STATS_DESCRIPTION: &str = "Return query and rejection counters and the number of active sessions.";

pub const HEALTH_CHECK_DESCRIPTION: &str =
    "Report database health, probe latency and connection pool usage.";
