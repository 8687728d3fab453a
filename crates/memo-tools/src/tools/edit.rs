//! `edit` tool: exact string replacement inside a file.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::ToolContext;
use crate::tool::{ToolDescriptor, ToolOutput};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditInput {
    pub path: String,
    pub old: String,
    pub new: String,
    #[serde(default)]
    pub replace_all: bool,
}

pub fn edit_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::typed(
        "edit",
        "Replace exact text in a file. Input: {\"path\", \"old\", \"new\", \"replace_all\"}. `old` must be unique unless replace_all is true.",
        move |input: EditInput| run(ctx.clone(), input),
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "path": { "type": "string" },
            "old": { "type": "string", "description": "Exact text to replace." },
            "new": { "type": "string", "description": "Replacement text." },
            "replace_all": { "type": "boolean", "description": "Replace every occurrence." }
        },
        "required": ["path", "old", "new"]
    }))
}

async fn run(ctx: Arc<ToolContext>, input: EditInput) -> anyhow::Result<ToolOutput> {
    if input.old.is_empty() {
        anyhow::bail!("`old` must not be empty");
    }
    let path = ctx.resolve(&input.path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let occurrences = content.matches(input.old.as_str()).count();
    match occurrences {
        0 => anyhow::bail!("Text to replace not found in {}", input.path),
        n if n > 1 && !input.replace_all => anyhow::bail!(
            "Found {n} occurrences in {}; set replace_all or give more context",
            input.path
        ),
        _ => {}
    }

    let updated = if input.replace_all {
        content.replace(input.old.as_str(), &input.new)
    } else {
        content.replacen(input.old.as_str(), &input.new, 1)
    };
    tokio::fs::write(&path, updated)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let replaced = if input.replace_all { occurrences } else { 1 };
    Ok(ToolOutput::text(format!(
        "Replaced {replaced} occurrence(s) in {}",
        input.path
    )))
}
