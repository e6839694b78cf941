//! Tool registry for MCP tools.
//!
//! Tools are registered explicitly at startup from [`ToolSpec`]s. A spec
//! lists its parameters once; both the JSON input schema sent to clients and
//! the `list_available_tools` catalogue are derived from that list.

use crate::protocol::{ToolAnnotations, ToolDefinition};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    /// A list of strings.
    Array,
    /// A list of strings, or a single comma-free string.
    StringOrArray,
}

impl ParamType {
    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({ "type": "string" }),
            ParamType::Integer => json!({ "type": "integer", "minimum": 1 }),
            ParamType::Array => json!({ "type": "array", "items": { "type": "string" } }),
            ParamType::StringOrArray => json!({
                "anyOf": [
                    { "type": "string" },
                    { "type": "array", "items": { "type": "string" } }
                ]
            }),
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    pub fn optional(
        name: &'static str,
        kind: ParamType,
        default: Option<Value>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default,
            description,
        }
    }
}

/// Declaration of a tool: name, documentation and parameters.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub doc: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    /// The MCP definition advertised through `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        let mut properties = Map::new();
        for param in &self.params {
            let mut schema = param.kind.schema();
            if let Value::Object(fields) = &mut schema {
                fields.insert("description".to_string(), json!(param.description));
                if let Some(default) = &param.default {
                    fields.insert("default".to_string(), default.clone());
                }
            }
            properties.insert(param.name.to_string(), schema);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        ToolDefinition {
            name: self.name.to_string(),
            description: Some(self.doc.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            annotations: Some(ToolAnnotations {
                read_only: Some(true),
                open_world: Some(false),
            }),
        }
    }
}

/// Registry of available MCP tools, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, spec: ToolSpec) {
        match self.index.get(spec.name) {
            Some(&position) => self.specs[position] = spec,
            None => {
                self.index.insert(spec.name.to_string(), self.specs.len());
                self.specs.push(spec);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// MCP definitions of every tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.specs.iter().map(ToolSpec::definition).collect()
    }

    /// `{tool, parameters, doc}` for every tool.
    pub fn catalogue(&self) -> Vec<Value> {
        self.specs
            .iter()
            .map(|spec| {
                json!({
                    "tool": spec.name,
                    "parameters": spec.params,
                    "doc": spec.doc,
                })
            })
            .collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Get tool names.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_tool(name: &'static str) -> ToolSpec {
        ToolSpec {
            name,
            doc: "Test tool",
            params: vec![
                ParamSpec::required("table_name", ParamType::String, "View to query"),
                ParamSpec::optional("limit", ParamType::Integer, Some(json!(200)), "Row limit"),
            ],
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(create_test_tool("test"));

        assert!(registry.get("test").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_registration_order_kept() {
        let mut registry = ToolRegistry::new();
        registry.register(create_test_tool("tool2"));
        registry.register(create_test_tool("tool1"));
        registry.register(create_test_tool("tool2"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["tool2", "tool1"]);
    }

    #[test]
    fn test_definition_schema() {
        let definition = create_test_tool("test").definition();
        assert_eq!(definition.input_schema["required"], json!(["table_name"]));
        assert_eq!(
            definition.input_schema["properties"]["limit"]["default"],
            json!(200)
        );
    }

    #[test]
    fn test_catalogue() {
        let mut registry = ToolRegistry::new();
        registry.register(create_test_tool("test"));
        let catalogue = registry.catalogue();
        assert_eq!(catalogue[0]["tool"], "test");
        assert_eq!(catalogue[0]["parameters"][0]["name"], "table_name");
        assert_eq!(catalogue[0]["parameters"][1]["type"], "integer");
    }
}
