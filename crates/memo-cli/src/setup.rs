use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use memo_config::MemoConfig;
use memo_core::{AgentDeps, AgentSession, SessionOptions, XmlHistoryFile};
use memo_hooks::{ActionPayload, HookEntry, HookRegistry, ObservationPayload, SessionHooks};
use memo_llm::DeepSeekClient;
use memo_tools::{ToolContext, ToolRegistry, create_toolkit};

/// Observation lines echoed to the console before eliding the rest.
const OBSERVATION_PREVIEW_LINES: usize = 8;

pub fn working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

pub fn toolkit(working_dir: &Path) -> ToolRegistry {
    create_toolkit(Arc::new(ToolContext::new(working_dir)))
}

/// A ready session plus what the front end shows about it.
pub struct Prepared {
    pub session: AgentSession,
    pub model: String,
    pub history_path: Option<PathBuf>,
}

/// Wire config, toolkit, prompt, model client and history into a session.
pub fn build_session(
    home: &Path,
    working_dir_override: Option<PathBuf>,
    once: bool,
    hooks: SessionHooks,
) -> Result<Prepared> {
    memo_config::ensure_home(home)?;
    let config = memo_config::load_config(home)?;
    let working_dir = working_dir(working_dir_override)?;
    let tools = toolkit(&working_dir);

    let template = memo_config::load_prompt_template(home, &config)?;
    let system_prompt = memo_config::render_prompt(&template, &tools.describe());

    let model = DeepSeekClient::from_settings(&config.model)?;
    let mut deps = AgentDeps::new(tools, Arc::new(model)).with_hooks(hooks);

    let history_path = history_path(home, &config);
    if let Some(path) = &history_path {
        deps = deps.with_history_sink(Arc::new(XmlHistoryFile::new(path)));
    }

    let max_actions = if once {
        1
    } else {
        config.agent.max_actions_per_turn
    };
    let options = SessionOptions::default()
        .with_system_prompt(system_prompt)
        .with_reply_format(config.agent.reply_format)
        .with_max_actions(max_actions);

    tracing::debug!(
        home = %home.display(),
        working_dir = %working_dir.display(),
        "Session wired"
    );
    Ok(Prepared {
        session: AgentSession::new(deps, options),
        model: config.model.model.clone(),
        history_path,
    })
}

fn history_path(home: &Path, config: &MemoConfig) -> Option<PathBuf> {
    config
        .history
        .enabled
        .then(|| config.history_path(home))
}

/// Hooks that print tool activity to stderr.
pub fn console_hooks() -> SessionHooks {
    HookRegistry::new()
        .on_action(HookEntry::sync_listener(|p: &ActionPayload| {
            let input = match &p.input {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            eprintln!("[tool: {}] {}", p.tool, first_line(&input));
            Ok(())
        }))
        .on_observation(HookEntry::sync_listener(|p: &ObservationPayload| {
            if p.is_error {
                eprintln!("[tool: {} - error] {}", p.tool, p.observation);
            } else {
                eprintln!("{}", preview(&p.observation));
            }
            Ok(())
        }))
        .build()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn preview(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= OBSERVATION_PREVIEW_LINES {
        return text.to_string();
    }
    format!(
        "{}\n... ({} more lines)",
        lines[..OBSERVATION_PREVIEW_LINES].join("\n"),
        lines.len() - OBSERVATION_PREVIEW_LINES
    )
}
