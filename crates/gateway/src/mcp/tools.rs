//! The four catalog operations and their typed arguments.

use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};

use tb_domain::{BatchEntry, Tag};

use crate::discovery::{compose, BatchPrompt, DiscoveryError, DiscoveryService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    GetTags,
    GetTagsBatch,
    GeneratePrompt,
    GeneratePromptBatch,
}

impl Tool {
    pub const ALL: [Tool; 4] = [
        Tool::GetTags,
        Tool::GetTagsBatch,
        Tool::GeneratePrompt,
        Tool::GeneratePromptBatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::GetTags => "get_tags",
            Tool::GetTagsBatch => "get_tags_batch",
            Tool::GeneratePrompt => "generate_prompt",
            Tool::GeneratePromptBatch => "generate_prompt_batch",
        }
    }

    pub fn is_batch(self) -> bool {
        matches!(self, Tool::GetTagsBatch | Tool::GeneratePromptBatch)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Arguments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Arguments of the single-endpoint tools.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointArgs {
    pub server_url: String,
    /// Falls back to `discovery.skip_system_tags` when absent.
    #[serde(default)]
    pub skip_system_tags: Option<bool>,
}

/// Arguments of the batch tools.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchArgs {
    pub servers: Vec<String>,
    #[serde(default)]
    pub skip_system_tags: Option<bool>,
}

/// A tool paired with arguments that have already been type-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    GetTags(EndpointArgs),
    GetTagsBatch(BatchArgs),
    GeneratePrompt(EndpointArgs),
    GeneratePromptBatch(BatchArgs),
}

impl ToolCall {
    /// Check `arguments` against `tool`'s input shape. `null` counts as an
    /// empty object.
    pub fn parse(tool: Tool, arguments: Value) -> Result<Self, serde_json::Error> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };
        Ok(match tool {
            Tool::GetTags => ToolCall::GetTags(serde_json::from_value(arguments)?),
            Tool::GetTagsBatch => ToolCall::GetTagsBatch(serde_json::from_value(arguments)?),
            Tool::GeneratePrompt => ToolCall::GeneratePrompt(serde_json::from_value(arguments)?),
            Tool::GeneratePromptBatch => {
                ToolCall::GeneratePromptBatch(serde_json::from_value(arguments)?)
            }
        })
    }

    pub fn tool(&self) -> Tool {
        match self {
            ToolCall::GetTags(_) => Tool::GetTags,
            ToolCall::GetTagsBatch(_) => Tool::GetTagsBatch,
            ToolCall::GeneratePrompt(_) => Tool::GeneratePrompt,
            ToolCall::GeneratePromptBatch(_) => Tool::GeneratePromptBatch,
        }
    }

    /// Run the call. Single-endpoint failures are returned; batch calls
    /// always succeed and report failing endpoints inline.
    pub async fn invoke(self, discovery: &DiscoveryService) -> Result<ToolOutput, DiscoveryError> {
        let skip = |requested: Option<bool>| {
            requested.unwrap_or_else(|| discovery.default_skip_system_tags())
        };

        Ok(match self {
            ToolCall::GetTags(args) => ToolOutput::Tags(
                discovery
                    .tags(&args.server_url, skip(args.skip_system_tags))
                    .await?,
            ),
            ToolCall::GetTagsBatch(args) => ToolOutput::Batch(
                discovery
                    .tags_batch(&args.servers, skip(args.skip_system_tags))
                    .await,
            ),
            ToolCall::GeneratePrompt(args) => {
                let tags = discovery
                    .tags(&args.server_url, skip(args.skip_system_tags))
                    .await?;
                ToolOutput::Prompt(BatchPrompt {
                    prompt: compose(&tags),
                    errors: Vec::new(),
                })
            }
            ToolCall::GeneratePromptBatch(args) => ToolOutput::Prompt(
                discovery
                    .prompt_batch(&args.servers, skip(args.skip_system_tags))
                    .await,
            ),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Tags(Vec<Tag>),
    Batch(Vec<BatchEntry>),
    Prompt(BatchPrompt),
}

impl ToolOutput {
    /// The result object shared by both envelopes: `{"tags": [...]}` or
    /// `{"prompt": "..."}`.
    pub fn into_value(self) -> Value {
        match self {
            ToolOutput::Tags(tags) => json!({ "tags": tags }),
            ToolOutput::Batch(entries) => json!({ "tags": entries }),
            ToolOutput::Prompt(prompt) => json!(prompt),
        }
    }
}
