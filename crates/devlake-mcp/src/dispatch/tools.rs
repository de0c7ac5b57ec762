//! Built-in tools

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::Pipeline;
use super::registry::{Tool, ToolDescriptor, ToolRegistry, parse_arguments};
use crate::constants::{
    CONNECT_DATABASE_DESCRIPTION, CONNECT_PROBE_QUERY, DATABASE_NAME_COLUMN,
    EXECUTE_QUERY_DESCRIPTION, GET_SECURITY_STATS_DESCRIPTION, GET_TABLE_SCHEMA_DESCRIPTION,
    HEALTH_CHECK_DESCRIPTION, LIST_DATABASES_DESCRIPTION, LIST_DATABASES_QUERY,
    LIST_TABLES_DESCRIPTION, LIST_TABLES_TEMPLATE, STATUS_CONNECTED, TABLE_SCHEMA_TEMPLATE,
};
use crate::security::{IdentifierKind, MaskedResult};
use crate::types::{ExecuteQueryParams, GetTableSchemaParams, ListTablesParams, NoParams};
use crate::{Error, Result};

pub const CONNECT_DATABASE: &str = "connect_database";
pub const LIST_DATABASES: &str = "list_databases";
pub const LIST_TABLES: &str = "list_tables";
pub const GET_TABLE_SCHEMA: &str = "get_table_schema";
pub const EXECUTE_QUERY: &str = "execute_query";
pub const GET_SECURITY_STATS: &str = "get_security_stats";
pub const HEALTH_CHECK: &str = "health_check";

/// Registry holding every built-in tool
pub fn builtin_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ConnectDatabase))?;
    registry.register(Box::new(ListDatabases))?;
    registry.register(Box::new(ListTables))?;
    registry.register(Box::new(GetTableSchema))?;
    registry.register(Box::new(ExecuteQuery))?;
    registry.register(Box::new(GetSecurityStats))?;
    registry.register(Box::new(HealthCheck))?;
    Ok(registry)
}

fn to_row<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(Error::Query(format!("expected an object, got {other}"))),
        Err(e) => Err(Error::Query(format!("failed to serialize result: {e}"))),
    }
}

struct ConnectDatabase;

#[async_trait]
impl Tool for ConnectDatabase {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<NoParams>(CONNECT_DATABASE, CONNECT_DATABASE_DESCRIPTION)
            .queries_database()
    }

    async fn invoke(&self, pipeline: &Pipeline, _: Map<String, Value>) -> Result<MaskedResult> {
        let start = Instant::now();
        let mut result = pipeline.run_query(CONNECT_PROBE_QUERY, Some(1)).await?;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(row) = result.rows.first_mut() {
            row.insert("status".into(), Value::from(STATUS_CONNECTED));
            row.insert("latency_ms".into(), Value::from(latency_ms));
        }
        tracing::info!(
            endpoint = pipeline.connections().endpoint(),
            latency_ms,
            "Database connection verified"
        );
        Ok(result)
    }
}

struct ListDatabases;

#[async_trait]
impl Tool for ListDatabases {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<NoParams>(LIST_DATABASES, LIST_DATABASES_DESCRIPTION)
            .queries_database()
    }

    async fn invoke(&self, pipeline: &Pipeline, _: Map<String, Value>) -> Result<MaskedResult> {
        let max = pipeline.connections().settings().max_row_limit;
        let mut result = pipeline.run_query(LIST_DATABASES_QUERY, Some(max)).await?;

        let filter = pipeline.validator().database_filter();
        result.rows.retain(|row| {
            row.get(DATABASE_NAME_COLUMN)
                .and_then(Value::as_str)
                .is_some_and(|name| filter.is_allowed(name))
        });
        tracing::debug!(tool = LIST_DATABASES, count = result.row_count(), "Query completed");
        Ok(result)
    }
}

struct ListTables;

#[async_trait]
impl Tool for ListTables {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<ListTablesParams>(LIST_TABLES, LIST_TABLES_DESCRIPTION)
            .queries_database()
    }

    async fn invoke(
        &self,
        pipeline: &Pipeline,
        arguments: Map<String, Value>,
    ) -> Result<MaskedResult> {
        let params: ListTablesParams = parse_arguments(arguments)?;
        pipeline
            .validator()
            .check_identifier(&params.database, IdentifierKind::Database)?;

        let max = pipeline.connections().settings().max_row_limit;
        let sql = LIST_TABLES_TEMPLATE.replace("{DATABASE}", &params.database);
        let result = pipeline.run_query(&sql, Some(max)).await?;
        tracing::debug!(
            tool = LIST_TABLES,
            database = %params.database,
            count = result.row_count(),
            "Query completed"
        );
        Ok(result)
    }
}

struct GetTableSchema;

#[async_trait]
impl Tool for GetTableSchema {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<GetTableSchemaParams>(GET_TABLE_SCHEMA, GET_TABLE_SCHEMA_DESCRIPTION)
            .queries_database()
    }

    async fn invoke(
        &self,
        pipeline: &Pipeline,
        arguments: Map<String, Value>,
    ) -> Result<MaskedResult> {
        let params: GetTableSchemaParams = parse_arguments(arguments)?;
        let validator = pipeline.validator();
        validator.check_identifier(&params.database, IdentifierKind::Database)?;
        validator.check_identifier(&params.table, IdentifierKind::Table)?;

        let max = pipeline.connections().settings().max_row_limit;
        let sql = TABLE_SCHEMA_TEMPLATE
            .replace("{DATABASE}", &params.database)
            .replace("{TABLE}", &params.table);
        let result = pipeline.run_query(&sql, Some(max)).await?;
        tracing::debug!(
            tool = GET_TABLE_SCHEMA,
            table = %params.table,
            columns = result.row_count(),
            "Query completed"
        );
        Ok(result)
    }
}

struct ExecuteQuery;

#[async_trait]
impl Tool for ExecuteQuery {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<ExecuteQueryParams>(EXECUTE_QUERY, EXECUTE_QUERY_DESCRIPTION)
            .queries_database()
    }

    async fn invoke(
        &self,
        pipeline: &Pipeline,
        arguments: Map<String, Value>,
    ) -> Result<MaskedResult> {
        let params: ExecuteQueryParams = parse_arguments(arguments)?;
        let result = pipeline.run_query(&params.query, params.limit).await?;
        tracing::debug!(
            tool = EXECUTE_QUERY,
            row_count = result.row_count(),
            truncated = result.truncated,
            "Query completed"
        );
        Ok(result)
    }
}

struct GetSecurityStats;

#[async_trait]
impl Tool for GetSecurityStats {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<NoParams>(GET_SECURITY_STATS, GET_SECURITY_STATS_DESCRIPTION)
    }

    async fn invoke(&self, pipeline: &Pipeline, _: Map<String, Value>) -> Result<MaskedResult> {
        let snapshot = pipeline.sessions().snapshot();
        Ok(MaskedResult::single(to_row(&snapshot)?))
    }
}

struct HealthCheck;

#[async_trait]
impl Tool for HealthCheck {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new::<NoParams>(HEALTH_CHECK, HEALTH_CHECK_DESCRIPTION)
    }

    async fn invoke(&self, pipeline: &Pipeline, _: Map<String, Value>) -> Result<MaskedResult> {
        let report = pipeline.connections().health_report().await;
        Ok(MaskedResult::single(to_row(&report)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_names() {
        let registry = builtin_registry().unwrap();
        let names: Vec<_> = registry.descriptors().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                CONNECT_DATABASE,
                EXECUTE_QUERY,
                GET_SECURITY_STATS,
                GET_TABLE_SCHEMA,
                HEALTH_CHECK,
                LIST_DATABASES,
                LIST_TABLES,
            ]
        );
    }

    #[test]
    fn test_database_tools_flagged() {
        let registry = builtin_registry().unwrap();
        for name in [CONNECT_DATABASE, LIST_DATABASES, LIST_TABLES, GET_TABLE_SCHEMA, EXECUTE_QUERY] {
            assert!(registry.get(name).unwrap().0.queries_database, "{name}");
        }
        for name in [GET_SECURITY_STATS, HEALTH_CHECK] {
            assert!(!registry.get(name).unwrap().0.queries_database, "{name}");
        }
    }

    #[test]
    fn test_introspection_queries_pass_validation() {
        let validator = crate::security::QueryValidator::default();
        let tables = LIST_TABLES_TEMPLATE.replace("{DATABASE}", "lake");
        let columns = TABLE_SCHEMA_TEMPLATE
            .replace("{DATABASE}", "lake")
            .replace("{TABLE}", "incidents");
        for sql in [CONNECT_PROBE_QUERY, LIST_DATABASES_QUERY, &tables, &columns] {
            assert!(validator.validate(sql).allowed, "{sql}");
        }
    }
}
