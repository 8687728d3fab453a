//! `read` tool: return the contents of a text file.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::ToolContext;
use crate::tool::{ToolDescriptor, ToolOutput};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadInput {
    Path(String),
    Detailed { path: String },
}

impl ReadInput {
    fn path(&self) -> &str {
        match self {
            ReadInput::Path(path) | ReadInput::Detailed { path } => path,
        }
    }
}

pub fn read_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::typed(
        "read",
        "Read a UTF-8 text file. Input is a path or {\"path\": ...}.",
        move |input: ReadInput| {
            let ctx = ctx.clone();
            async move {
                let path = ctx.resolve(input.path());
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(ToolOutput::text(content))
            }
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": "File path to read." }
        },
        "required": ["path"]
    }))
}
