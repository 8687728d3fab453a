//! `write` tool: create, overwrite or append to a file.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::context::ToolContext;
use crate::tool::{ToolDescriptor, ToolOutput};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Append,
    #[default]
    Overwrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteInput {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub mode: WriteMode,
}

pub fn write_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::typed(
        "write",
        "Write a file. Input: {\"path\", \"content\", \"mode\": \"overwrite\"|\"append\"}. Parent directories are created.",
        move |input: WriteInput| run(ctx.clone(), input),
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": "File path to write." },
            "content": { "type": "string", "description": "Text to write." },
            "mode": {
                "type": "string",
                "enum": ["overwrite", "append"],
                "description": "Write mode (default: overwrite)."
            }
        },
        "required": ["path", "content"]
    }))
}

async fn run(ctx: Arc<ToolContext>, input: WriteInput) -> anyhow::Result<ToolOutput> {
    let path = ctx.resolve(&input.path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(input.mode == WriteMode::Append)
        .truncate(input.mode == WriteMode::Overwrite)
        .open(&path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(input.content.as_bytes()).await?;
    file.flush().await?;

    let verb = match input.mode {
        WriteMode::Append => "Appended",
        WriteMode::Overwrite => "Wrote",
    };
    Ok(ToolOutput::text(format!(
        "{verb} {} bytes to {}",
        input.content.len(),
        input.path
    )))
}
