//! Transcript persistence.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::Mutex;

use memo_types::{Role, TranscriptEntry};

/// Receives every transcript entry as it is appended.
///
/// Failures of `record` are logged by the session and never abort a turn.
/// `flush` runs when the session closes.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: &TranscriptEntry) -> anyhow::Result<()>;

    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes the transcript as an XML document.
///
/// Each message body sits in a CDATA section; the file is rewritten in full
/// on every flush.
#[derive(Debug)]
pub struct XmlHistoryFile {
    path: PathBuf,
    started_at: DateTime<Utc>,
    messages: Mutex<Vec<String>>,
}

impl XmlHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            started_at: Utc::now(),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the current document.
    pub async fn render(&self) -> String {
        let messages = self.messages.lock().await;
        let mut lines = Vec::with_capacity(messages.len() + 3);
        lines.push(r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string());
        lines.push(format!(
            "<history startedAt=\"{}\">",
            self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        lines.extend(messages.iter().cloned());
        lines.push("</history>".to_string());
        lines.push(String::new());
        lines.join("\n")
    }
}

#[async_trait]
impl HistorySink for XmlHistoryFile {
    async fn record(&self, entry: &TranscriptEntry) -> anyhow::Result<()> {
        self.messages
            .lock()
            .await
            .push(wrap_message(entry.role, &entry.content));
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let document = self.render().await;
        tokio::fs::write(&self.path, document)
            .await
            .with_context(|| format!("Failed to write history to {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "History written");
        Ok(())
    }
}

/// Split every `]]>` so the text can sit inside a CDATA section.
pub fn escape_cdata(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

fn wrap_message(role: Role, content: &str) -> String {
    format!(
        "  <message role=\"{role}\">\n    <![CDATA[\n{}\n    ]]>\n  </message>",
        escape_cdata(content)
    )
}
