//! Built-in tool implementations.
//!
//! Each module exposes a constructor returning a [`ToolDescriptor`] bound to
//! a shared [`ToolContext`].

pub mod bash;
pub mod edit;
pub mod fetch;
pub mod glob;
pub mod grep;
pub mod read;
pub mod write;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::context::ToolContext;
use crate::registry::ToolRegistry;
use crate::tool::ToolDescriptor;

/// Directories never descended into by `glob` and `grep`.
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Create every built-in tool.
pub fn builtin_tools(ctx: Arc<ToolContext>) -> Vec<ToolDescriptor> {
    vec![
        bash::bash_tool(ctx.clone()),
        read::read_tool(ctx.clone()),
        write::write_tool(ctx.clone()),
        edit::edit_tool(ctx.clone()),
        glob::glob_tool(ctx.clone()),
        grep::grep_tool(ctx.clone()),
        fetch::fetch_tool(ctx),
    ]
}

/// A registry holding every built-in tool.
pub fn create_toolkit(ctx: Arc<ToolContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in builtin_tools(ctx) {
        registry.register(tool);
    }
    tracing::debug!("Created toolkit with {} tools", registry.len());
    registry
}

/// Truncate `text` to at most `max_chars` characters. Returns whether it was cut.
pub(crate) fn truncate_chars(text: &mut String, max_chars: usize) -> bool {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            text.truncate(byte_idx);
            true
        }
        None => false,
    }
}

/// Walk `base` depth-first, yielding `(path, relative path with '/' separators)`
/// for every file outside [`SKIP_DIRS`].
pub(crate) fn walk_files(base: &Path) -> impl Iterator<Item = (PathBuf, String)> + '_ {
    WalkDir::new(base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry.depth() > 0
                && SKIP_DIRS.iter().any(|dir| entry.file_name() == *dir))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(move |entry| {
            let rel = entry.path().strip_prefix(base).ok()?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((entry.into_path(), rel))
        })
}
