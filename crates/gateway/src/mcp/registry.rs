//! Tool catalog: descriptors for `/registry` and `tools/list`.

use serde::Serialize;
use serde_json::{json, Value};

use super::protocol::{McpToolDef, ToolsListResult};
use super::tools::Tool;

pub const REGISTRY_NAME: &str = "MCP Data Modeling Tools";

pub const REGISTRY_DESCRIPTION: &str =
    "MCP server tools for discovering, modeling, and analyzing OPC UA servers using AI agents.";

/// Public description of one tool. The tool itself is the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub endpoint: &'static str,
    pub method: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub output_schema: Value,
    #[serde(skip)]
    pub tool: Tool,
}

impl ToolDescriptor {
    fn new(tool: Tool) -> Self {
        let (endpoint, description) = match tool {
            Tool::GetTags => (
                "/tags",
                "Returns all variable nodes from the specified OPC UA server.",
            ),
            Tool::GetTagsBatch => ("/tags/batch", "Fetch tags from multiple OPC UA servers."),
            Tool::GeneratePrompt => (
                "/prompt",
                "Generates a modeling prompt from OPC UA server tags.",
            ),
            Tool::GeneratePromptBatch => (
                "/prompt/batch",
                "Generates a modeling prompt from multiple OPC UA servers.",
            ),
        };

        let input_schema = if tool.is_batch() {
            json!({
                "type": "object",
                "properties": {
                    "servers": { "type": "array", "items": { "type": "string" } },
                    "skip_system_tags": { "type": "boolean", "default": true }
                },
                "required": ["servers"]
            })
        } else {
            json!({
                "type": "object",
                "properties": {
                    "server_url": { "type": "string" },
                    "skip_system_tags": { "type": "boolean", "default": true }
                },
                "required": ["server_url"]
            })
        };

        let output_schema = match tool {
            Tool::GetTags | Tool::GetTagsBatch => {
                json!({ "type": "array", "items": { "type": "object" } })
            }
            Tool::GeneratePrompt | Tool::GeneratePromptBatch => json!({ "type": "string" }),
        };

        Self {
            name: tool.name(),
            endpoint,
            method: "POST",
            description,
            input_schema,
            output_schema,
            tool,
        }
    }

    pub fn to_mcp(&self) -> McpToolDef {
        McpToolDef {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// The `/registry` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryDocument {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub base_url: String,
    pub tools: Vec<ToolDescriptor>,
}

/// Fixed catalog of the four tools.
pub struct ToolRegistry {
    base_url: String,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// `base_url` is advertised in the registry document.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            descriptors: Tool::ALL.into_iter().map(ToolDescriptor::new).collect(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Look a tool up by its catalog name.
    pub fn lookup(&self, name: &str) -> Option<Tool> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.name == name)
            .map(|descriptor| descriptor.tool)
    }

    pub fn document(&self) -> RegistryDocument {
        RegistryDocument {
            name: REGISTRY_NAME,
            version: env!("CARGO_PKG_VERSION"),
            description: REGISTRY_DESCRIPTION,
            base_url: self.base_url.clone(),
            tools: self.descriptors.clone(),
        }
    }

    /// The `tools/list` result.
    pub fn list(&self) -> ToolsListResult {
        ToolsListResult {
            tools: self.descriptors.iter().map(ToolDescriptor::to_mcp).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_holds_the_four_tools_in_order() {
        let registry = ToolRegistry::new("http://localhost:8000");
        let names: Vec<_> = registry.descriptors().iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["get_tags", "get_tags_batch", "generate_prompt", "generate_prompt_batch"]
        );
    }

    #[test]
    fn lookup_by_name() {
        let registry = ToolRegistry::new("http://localhost:8000");
        assert_eq!(registry.lookup("generate_prompt"), Some(Tool::GeneratePrompt));
        assert_eq!(registry.lookup("read_value"), None);
    }

    #[test]
    fn document_serializes_without_handlers() {
        let registry = ToolRegistry::new("http://gateway:9000");
        let value = serde_json::to_value(registry.document()).unwrap();
        assert_eq!(value["name"], REGISTRY_NAME);
        assert_eq!(value["base_url"], "http://gateway:9000");
        let first = &value["tools"][0];
        assert_eq!(first["endpoint"], "/tags");
        assert_eq!(first["input_schema"]["required"][0], "server_url");
        assert!(first.get("tool").is_none());
        assert_eq!(value["tools"][1]["input_schema"]["required"][0], "servers");
        assert_eq!(value["tools"][3]["output_schema"]["type"], "string");
    }

    #[test]
    fn list_exposes_name_description_and_input_schema() {
        let registry = ToolRegistry::new("http://localhost:8000");
        let value = serde_json::to_value(registry.list()).unwrap();
        let tool = value["tools"][0].as_object().unwrap();
        let mut keys: Vec<_> = tool.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["description", "inputSchema", "name"]);
    }
}
