//! `glob` tool: list files matching a glob pattern.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::ToolContext;
use crate::tool::{ToolDescriptor, ToolOutput};
use crate::tools::walk_files;

const DEFAULT_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GlobInput {
    Pattern(String),
    Detailed {
        pattern: String,
        /// Directory to search, relative to the working directory.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

pub fn glob_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::typed(
        "glob",
        "Find files by glob pattern (e.g. `src/**/*.rs`). Returns matching paths relative to the search directory.",
        move |input: GlobInput| {
            let ctx = ctx.clone();
            async move {
                tokio::task::spawn_blocking(move || search(&ctx, input)).await?
            }
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "pattern": { "type": "string", "description": "Glob pattern." },
            "path": { "type": "string", "description": "Directory to search (default: working directory)." },
            "limit": { "type": "integer", "description": "Maximum results (default: 200)." }
        },
        "required": ["pattern"]
    }))
}

fn search(ctx: &ToolContext, input: GlobInput) -> anyhow::Result<ToolOutput> {
    let (pattern, path, limit) = match input {
        GlobInput::Pattern(pattern) => (pattern, None, None),
        GlobInput::Detailed {
            pattern,
            path,
            limit,
        } => (pattern, path, limit),
    };
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let compiled = ::glob::Pattern::new(&pattern)
        .map_err(|err| anyhow::anyhow!("invalid glob pattern '{pattern}': {err}"))?;
    let base = match &path {
        Some(path) => ctx.resolve(path),
        None => ctx.working_dir.clone(),
    };
    if !base.is_dir() {
        anyhow::bail!("Not a directory: {}", base.display());
    }

    let matches: Vec<String> = walk_files(&base)
        .map(|(_, rel)| rel)
        .filter(|rel| compiled.matches(rel))
        .take(limit)
        .collect();

    if matches.is_empty() {
        return Ok(ToolOutput::text(format!("No files matched {pattern}")));
    }
    Ok(ToolOutput::text(matches.join("\n")))
}
