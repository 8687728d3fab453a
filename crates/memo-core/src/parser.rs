//! Assistant reply parsing.
//!
//! A reply decodes to exactly one of action, final answer or malformed.
//! Action wins when both markers are present, since the loop is
//! action-driven.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use memo_types::ReplyFormat;

static ACTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<action[^>]*\btool\s*=\s*"([^"]+)"[^>]*>(.*?)</action>"#)
        .expect("action pattern is valid")
});

static FINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<final>(.*?)</final>").expect("final pattern is valid"));

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z0-9]*\s*(.*?)\s*```$").expect("fence pattern is valid")
});

/// Decoded intent of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// Invoke `tool` with raw `input`.
    Action { tool: String, input: String },
    /// The turn's answer.
    Final { text: String },
    /// Neither marker was found.
    Malformed,
}

/// Parse `content` using the given encoding.
pub fn parse_reply(format: ReplyFormat, content: &str) -> ParsedReply {
    match format {
        ReplyFormat::Xml => parse_xml(content),
        ReplyFormat::Json => parse_json(content),
    }
}

fn parse_xml(content: &str) -> ParsedReply {
    if let Some(caps) = ACTION_RE.captures(content) {
        return ParsedReply::Action {
            tool: caps[1].trim().to_string(),
            input: caps[2].trim().to_string(),
        };
    }
    if let Some(caps) = FINAL_RE.captures(content) {
        return ParsedReply::Final {
            text: caps[1].trim().to_string(),
        };
    }
    ParsedReply::Malformed
}

fn parse_json(content: &str) -> ParsedReply {
    let Some(Value::Object(map)) = extract_json(content) else {
        return ParsedReply::Malformed;
    };

    if let Some(Value::String(tool)) = map.get("tool") {
        let input = match map.get("input") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
        };
        return ParsedReply::Action {
            tool: tool.trim().to_string(),
            input,
        };
    }

    match map.get("final") {
        Some(Value::String(text)) => ParsedReply::Final {
            text: text.trim().to_string(),
        },
        Some(Value::Null) | None => ParsedReply::Malformed,
        Some(other) => ParsedReply::Final {
            text: other.to_string(),
        },
    }
}

/// Find the JSON value in a reply, tolerating code fences and prose around
/// a single object.
fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    let unfenced = FENCE_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&unfenced[start..=end]).ok()
}

/// Render a tool observation as the message fed back to the model.
pub fn render_observation(format: ReplyFormat, tool: &str, text: &str, is_error: bool) -> String {
    let status = if is_error { "error" } else { "ok" };
    match format {
        ReplyFormat::Xml => {
            format!("<observation tool=\"{tool}\" status=\"{status}\">\n{text}\n</observation>")
        }
        ReplyFormat::Json => json!({
            "observation": {
                "tool": tool,
                "status": status,
                "content": text,
            }
        })
        .to_string(),
    }
}
