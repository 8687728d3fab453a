use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use memo_types::ReplyFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Home directory not found")]
    NoHomeDir,
    #[error("Failed to read prompt template {path}: {source}")]
    PromptTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f32 {
    0.35
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Turn loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Upper bound on tool dispatches within one turn.
    #[serde(default = "default_max_actions")]
    pub max_actions_per_turn: usize,
    /// Reply encoding the system prompt asks the model to use.
    #[serde(default)]
    pub reply_format: ReplyFormat,
}

fn default_max_actions() -> usize {
    20
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_actions_per_turn: default_max_actions(),
            reply_format: ReplyFormat::default(),
        }
    }
}

/// Transcript persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// History file name, relative to the memo home directory.
    #[serde(default = "default_history_file")]
    pub file: String,
}

fn default_true() -> bool {
    true
}

fn default_history_file() -> String {
    "history.xml".to_string()
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            file: default_history_file(),
        }
    }
}

/// Top-level memo configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoConfig {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub history: HistorySettings,
    /// System prompt template, relative to the memo home directory.
    #[serde(default = "default_prompt_file")]
    pub prompt_file: String,
}

fn default_prompt_file() -> String {
    "prompt.tmpl".to_string()
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            agent: AgentSettings::default(),
            history: HistorySettings::default(),
            prompt_file: default_prompt_file(),
        }
    }
}

impl MemoConfig {
    /// Absolute path of the history file under `home`.
    pub fn history_path(&self, home: &Path) -> PathBuf {
        home.join(&self.history.file)
    }

    /// Absolute path of the prompt template under `home`.
    pub fn prompt_path(&self, home: &Path) -> PathBuf {
        home.join(&self.prompt_file)
    }
}

/// Built-in prompt used when no template file exists and the reply format is XML.
pub const DEFAULT_XML_PROMPT: &str = r#"You are memo, a careful coding assistant working in the user's project.

You can use these tools:
{{tools}}

Reply with exactly one of:
<action tool="TOOL_NAME">INPUT</action>
<final>ANSWER</final>

Tool inputs are either plain text or a JSON object. After each action you will
receive an <observation> with the result. Use <final> once the task is done."#;

/// Built-in prompt used when no template file exists and the reply format is JSON.
pub const DEFAULT_JSON_PROMPT: &str = r#"You are memo, a careful coding assistant working in the user's project.

You can use these tools:
{{tools}}

Reply with a single JSON object, either
{"tool": "TOOL_NAME", "input": INPUT}
or
{"final": "ANSWER"}

After each tool call you will receive an observation object with the result.
Answer with "final" once the task is done."#;

/// Resolve the memo home directory: an explicit override wins, else `~/.memo/`.
pub fn resolve_home(home_override: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match home_override {
        Some(home) => Ok(home),
        None => default_home(),
    }
}

/// The default memo home directory (`~/.memo/`).
pub fn default_home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".memo"))
        .ok_or(ConfigError::NoHomeDir)
}

/// Resolve the config file path (`<home>/config.json5`).
pub fn config_file_path(home: &Path) -> PathBuf {
    home.join("config.json5")
}

/// Load configuration from `home`, falling back to defaults.
pub fn load_config(home: &Path) -> Result<MemoConfig, ConfigError> {
    // Load .env from the working directory, then the home directory
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_path(home.join(".env"));

    load_config_from(&config_file_path(home))
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<MemoConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(MemoConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: MemoConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Ensure the home directory exists.
pub fn ensure_home(home: &Path) -> Result<(), ConfigError> {
    if !home.exists() {
        std::fs::create_dir_all(home)?;
    }
    Ok(())
}

/// Read the system prompt template, or the built-in one if the file is absent.
pub fn load_prompt_template(home: &Path, config: &MemoConfig) -> Result<String, ConfigError> {
    let path = config.prompt_path(home);
    if !path.exists() {
        tracing::debug!("Prompt template not found at {}, using built-in", path.display());
        return Ok(match config.agent.reply_format {
            ReplyFormat::Xml => DEFAULT_XML_PROMPT.to_string(),
            ReplyFormat::Json => DEFAULT_JSON_PROMPT.to_string(),
        });
    }
    std::fs::read_to_string(&path).map_err(|source| ConfigError::PromptTemplate { path, source })
}

/// Substitute the `{{tools}}` placeholder of a prompt template.
pub fn render_prompt(template: &str, tools: &str) -> String {
    template.replace("{{tools}}", tools)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MemoConfig::default();
        assert_eq!(config.model.model, "deepseek-chat");
        assert_eq!(config.model.api_key_env, "DEEPSEEK_API_KEY");
        assert_eq!(config.agent.max_actions_per_turn, 20);
        assert_eq!(config.agent.reply_format, ReplyFormat::Xml);
        assert!(config.history.enabled);
        assert_eq!(config.prompt_file, "prompt.tmpl");
    }

    #[test]
    fn test_json5_parse() {
        let json5_str = r#"{
            model: { model: "deepseek-reasoner", temperature: 0.1 },
            agent: { max_actions_per_turn: 1, reply_format: "json" },
            // trailing commas and comments are fine
            history: { enabled: false, },
        }"#;
        let config: MemoConfig = json5::from_str(json5_str).unwrap();
        assert_eq!(config.model.model, "deepseek-reasoner");
        assert_eq!(config.model.base_url, "https://api.deepseek.com/v1");
        assert_eq!(config.agent.max_actions_per_turn, 1);
        assert_eq!(config.agent.reply_format, ReplyFormat::Json);
        assert!(!config.history.enabled);
        assert_eq!(config.history.file, "history.xml");
    }

    #[test]
    fn test_resolve_home_override() {
        let home = resolve_home(Some(PathBuf::from("/tmp/memo-home"))).unwrap();
        assert_eq!(home, PathBuf::from("/tmp/memo-home"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json5")).unwrap();
        assert_eq!(config.agent.max_actions_per_turn, 20);
    }

    #[test]
    fn test_empty_home_uses_builtin_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.prompt_path(dir.path()), dir.path().join("prompt.tmpl"));

        let template = load_prompt_template(dir.path(), &config).unwrap();
        assert_eq!(template, DEFAULT_XML_PROMPT);
    }

    #[test]
    fn test_load_from_home_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("nested-home");
        ensure_home(&home).unwrap();
        std::fs::write(
            config_file_path(&home),
            "// partial config\n{ agent: { max_actions_per_turn: 3 } }",
        )
        .unwrap();

        let loaded = load_config_from(&config_file_path(&home)).unwrap();
        assert_eq!(loaded.agent.max_actions_per_turn, 3);
        assert_eq!(loaded.history_path(&home), home.join("history.xml"));
        assert_eq!(loaded.prompt_file, "prompt.tmpl");
    }

    #[test]
    fn test_prompt_template_fallback_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MemoConfig::default();
        let builtin = load_prompt_template(dir.path(), &config).unwrap();
        assert!(builtin.contains("<action tool="));

        config.agent.reply_format = ReplyFormat::Json;
        let builtin = load_prompt_template(dir.path(), &config).unwrap();
        assert!(builtin.contains("\"final\""));

        std::fs::write(dir.path().join("prompt.tmpl"), "Tools:\n{{tools}}").unwrap();
        let template = load_prompt_template(dir.path(), &config).unwrap();
        assert_eq!(render_prompt(&template, "- echo"), "Tools:\n- echo");
    }
}
