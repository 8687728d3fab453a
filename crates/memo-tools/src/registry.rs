//! Tool registry: name lookup plus validated, failure-contained invocation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::tool::{ToolDescriptor, ToolError, ToolExecutor, ToolOutput};

/// A tool call whose input already passed validation.
pub struct PreparedCall {
    pub tool: String,
    pub input: Value,
    executor: Arc<dyn ToolExecutor>,
}

impl PreparedCall {
    /// Run the executor. Failures come back as [`ToolError::ExecutionFailed`].
    pub async fn execute(self) -> Result<ToolOutput, ToolError> {
        tracing::debug!("Executing tool: {}", self.tool);
        self.executor
            .execute(self.input)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: self.tool,
                message: format!("{e:#}"),
            })
    }
}

/// Registry of available tools, keyed by unique name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: ToolDescriptor) {
        let name = tool.name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool {} registered twice, keeping the last one", name);
        } else {
            tracing::debug!("Registered tool: {}", name);
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: ToolDescriptor) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One `- name: description` line per tool, for system prompts.
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Look up `name` and validate `raw` against its validator.
    pub fn prepare(&self, name: &str, raw: &str) -> Result<PreparedCall, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        let input = tool
            .validator
            .validate(raw)
            .map_err(|e| ToolError::InvalidInput {
                tool: name.to_string(),
                diagnostics: e.diagnostics,
            })?;
        Ok(PreparedCall {
            tool: name.to_string(),
            input,
            executor: tool.executor.clone(),
        })
    }

    /// Validate and execute in one step.
    pub async fn invoke(&self, name: &str, raw: &str) -> Result<ToolOutput, ToolError> {
        self.prepare(name, raw)?.execute().await
    }
}
