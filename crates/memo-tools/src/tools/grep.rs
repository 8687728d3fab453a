//! `grep` tool: regex search over file contents.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::ToolContext;
use crate::tool::{ToolDescriptor, ToolOutput};
use crate::tools::walk_files;

const DEFAULT_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrepInput {
    Pattern(String),
    Detailed {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        /// Only search files whose relative path matches this glob.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        glob: Option<String>,
        #[serde(default = "default_true")]
        case_sensitive: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

fn default_true() -> bool {
    true
}

pub fn grep_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::typed(
        "grep",
        "Search file contents with a regular expression. Returns `path:line: text` matches.",
        move |input: GrepInput| {
            let ctx = ctx.clone();
            async move {
                tokio::task::spawn_blocking(move || search(&ctx, input)).await?
            }
        },
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "pattern": { "type": "string", "description": "Regular expression." },
            "path": { "type": "string", "description": "Directory to search (default: working directory)." },
            "glob": { "type": "string", "description": "Restrict to files matching this glob." },
            "case_sensitive": { "type": "boolean", "description": "Default: true." },
            "limit": { "type": "integer", "description": "Maximum matches (default: 200)." }
        },
        "required": ["pattern"]
    }))
}

fn search(ctx: &ToolContext, input: GrepInput) -> anyhow::Result<ToolOutput> {
    let (pattern, path, file_glob, case_sensitive, limit) = match input {
        GrepInput::Pattern(pattern) => (pattern, None, None, true, None),
        GrepInput::Detailed {
            pattern,
            path,
            glob,
            case_sensitive,
            limit,
        } => (pattern, path, glob, case_sensitive, limit),
    };
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let regex = regex::RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()?;
    let compiled_glob = file_glob
        .as_deref()
        .map(|g| {
            ::glob::Pattern::new(g).map_err(|err| anyhow::anyhow!("invalid glob pattern '{g}': {err}"))
        })
        .transpose()?;
    let base = match &path {
        Some(path) => ctx.resolve(path),
        None => ctx.working_dir.clone(),
    };

    if !base.exists() {
        anyhow::bail!("Path not found: {}", base.display());
    }
    let files: Vec<(PathBuf, String)> = if base.is_file() {
        let label = base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| base.display().to_string());
        vec![(base.clone(), label)]
    } else {
        walk_files(&base).collect()
    };

    let mut matches = Vec::new();
    'files: for (file, rel) in files {
        if let Some(compiled) = &compiled_glob {
            if !compiled.matches(&rel) {
                continue;
            }
        }
        let Ok(bytes) = std::fs::read(&file) else {
            continue;
        };
        if is_binary(&bytes) {
            continue;
        }
        let Ok(content) = String::from_utf8(bytes) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{rel}:{}: {line}", idx + 1));
                if matches.len() >= limit {
                    break 'files;
                }
            }
        }
    }

    if matches.is_empty() {
        return Ok(ToolOutput::text(format!("No matches for {pattern}")));
    }
    Ok(ToolOutput::text(matches.join("\n")))
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|b| *b == 0)
}
