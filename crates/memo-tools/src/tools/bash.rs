//! `bash` tool: shell command execution with timeout and output truncation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::ToolContext;
use crate::tool::{ToolDescriptor, ToolOutput};
use crate::tools::truncate_chars;

/// Maximum output size in characters before truncation.
const MAX_OUTPUT_CHARS: usize = 200_000;

/// Default timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Either a bare command line or a command with options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BashInput {
    Command(String),
    Detailed {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
    },
}

impl BashInput {
    fn command(&self) -> &str {
        match self {
            BashInput::Command(command) | BashInput::Detailed { command, .. } => command,
        }
    }

    fn timeout(&self) -> Duration {
        let secs = match self {
            BashInput::Detailed {
                timeout_seconds: Some(secs),
                ..
            } => *secs,
            _ => DEFAULT_TIMEOUT_SECS,
        };
        Duration::from_secs(secs)
    }
}

pub fn bash_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::typed(
        "bash",
        "Run a shell command in the working directory and return its exit code, stdout and stderr.",
        move |input: BashInput| run(ctx.clone(), input),
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "command": {
                "type": "string",
                "description": "The shell command to execute."
            },
            "timeout_seconds": {
                "type": "integer",
                "description": "Timeout in seconds (default: 120)."
            }
        },
        "required": ["command"]
    }))
}

async fn run(ctx: Arc<ToolContext>, input: BashInput) -> anyhow::Result<ToolOutput> {
    let command = input.command();
    if command.trim().is_empty() {
        anyhow::bail!("Missing command");
    }
    let timeout = input.timeout();

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(&ctx.working_dir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => output.context("Command execution failed")?,
        Err(_) => anyhow::bail!("Command timed out after {}s", timeout.as_secs()),
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let mut stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut truncated = false;
    if truncate_chars(&mut stdout, MAX_OUTPUT_CHARS) {
        stdout.push_str("\n... [output truncated]");
        truncated = true;
    }
    if truncate_chars(&mut stderr, MAX_OUTPUT_CHARS) {
        stderr.push_str("\n... [output truncated]");
        truncated = true;
    }

    let mut result = format!("Exit code: {exit_code}\n");
    if !stdout.is_empty() {
        result.push_str(&format!("\n--- stdout ---\n{stdout}\n"));
    }
    if !stderr.is_empty() {
        result.push_str(&format!("\n--- stderr ---\n{stderr}\n"));
    }
    if truncated {
        result.push_str("\n[Output was truncated due to size limits]\n");
    }

    Ok(ToolOutput::text(result))
}
