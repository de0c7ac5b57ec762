//! Static tool registry

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::Pipeline;
use crate::security::MaskedResult;
use crate::{Error, Result};

/// Name, description and JSON input schema of a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    /// Calls count towards `totalQueries`
    #[serde(skip)]
    pub queries_database: bool,
}

impl ToolDescriptor {
    pub fn new<P: JsonSchema>(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            input_schema: schemars::schema_for!(P).to_value(),
            queries_database: false,
        }
    }

    #[must_use]
    pub const fn queries_database(mut self) -> Self {
        self.queries_database = true;
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn describe(&self) -> ToolDescriptor;

    async fn invoke(&self, pipeline: &Pipeline, arguments: Map<String, Value>)
    -> Result<MaskedResult>;
}

/// Decode tool arguments into their parameter struct.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| Error::InvalidArguments(e.to_string()))
}

struct Registered {
    descriptor: ToolDescriptor,
    tool: Box<dyn Tool>,
}

/// Mapping from tool name to handler, fixed once the server starts
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Registered>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let descriptor = tool.describe();
        if self.tools.contains_key(descriptor.name) {
            return Err(Error::Config(format!(
                "tool {} registered twice",
                descriptor.name
            )));
        }
        self.tools
            .insert(descriptor.name, Registered { descriptor, tool });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<(&ToolDescriptor, &dyn Tool)> {
        self.tools
            .get(name)
            .map(|entry| (&entry.descriptor, entry.tool.as_ref()))
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values().map(|entry| &entry.descriptor)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{ExecuteQueryParams, NoParams};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor::new::<NoParams>("echo", "Echo")
        }

        async fn invoke(
            &self,
            _pipeline: &Pipeline,
            arguments: Map<String, Value>,
        ) -> Result<MaskedResult> {
            Ok(MaskedResult::single(arguments))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(Echo)).unwrap();

        let (descriptor, _) = registry.get("echo").unwrap();
        assert_eq!(descriptor.name, "echo");
        assert!(!descriptor.queries_database);
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo)).unwrap();
        let err = registry.register(Box::new(Echo)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_descriptor_schema() {
        let descriptor =
            ToolDescriptor::new::<ExecuteQueryParams>("execute_query", "Run").queries_database();
        assert!(descriptor.queries_database);
        assert!(descriptor.input_schema["properties"]["query"].is_object());

        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("inputSchema").is_some());
        assert!(json.get("queriesDatabase").is_none());
    }

    #[test]
    fn test_parse_arguments() {
        let Value::Object(args) = json!({"query": "SELECT 1", "limit": 3}) else {
            unreachable!()
        };
        let params: ExecuteQueryParams = parse_arguments(args).unwrap();
        assert_eq!(params.limit, Some(3));

        let Value::Object(bad) = json!({"limit": "many"}) else {
            unreachable!()
        };
        let err = parse_arguments::<ExecuteQueryParams>(bad).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }
}
