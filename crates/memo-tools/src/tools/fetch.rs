//! `fetch` tool: HTTP GET a URL and return the response body.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::context::ToolContext;
use crate::tool::{
    InputValidator, ToolDescriptor, ToolExecutor, ToolOutput, ValidationError, decode_raw_input,
};
use crate::tools::truncate_chars;

/// Maximum body size in characters before truncation.
const MAX_BODY_CHARS: usize = 100_000;

const MAX_ERROR_CHARS: usize = 2_000;

/// Read at most enough bytes to hold `max_chars` UTF-8 characters. Returns
/// the decoded text and whether anything was cut off.
async fn read_body(
    mut response: reqwest::Response,
    max_chars: usize,
) -> anyhow::Result<(String, bool)> {
    let max_bytes = max_chars.saturating_mul(4);
    let mut buf: Vec<u8> = Vec::new();
    let mut cut = false;
    while let Some(chunk) = response.chunk().await? {
        let room = max_bytes - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            cut = true;
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    let mut body = String::from_utf8_lossy(&buf).into_owned();
    let truncated = truncate_chars(&mut body, max_chars);
    Ok((body, cut || truncated))
}

/// Accepts a URL string or `{"url": ...}`; only `http` and `https` pass.
struct UrlValidator;

impl InputValidator for UrlValidator {
    fn validate(&self, raw: &str) -> Result<Value, ValidationError> {
        let candidate = match decode_raw_input(raw.trim()) {
            Value::String(s) => s,
            Value::Object(map) => match map.get("url") {
                Some(Value::String(s)) => s.clone(),
                _ => return Err(ValidationError::new("missing string field `url`")),
            },
            _ => return Err(ValidationError::new("expected a URL or {\"url\": ...}")),
        };
        let url = Url::parse(candidate.trim())
            .map_err(|e| ValidationError::new(format!("invalid URL '{candidate}': {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(Value::String(url.to_string())),
            other => Err(ValidationError::new(format!(
                "unsupported URL scheme '{other}'"
            ))),
        }
    }
}

struct FetchExecutor {
    ctx: Arc<ToolContext>,
}

#[async_trait]
impl ToolExecutor for FetchExecutor {
    async fn execute(&self, input: Value) -> anyhow::Result<ToolOutput> {
        let url = input
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("expected a validated URL string"))?;
        let response = self
            .ctx
            .http
            .get(url)
            .timeout(self.ctx.fetch_timeout)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let (body, _) = read_body(response, MAX_ERROR_CHARS).await?;
            anyhow::bail!("HTTP {status} from {url}: {body}");
        }
        let (mut body, truncated) = read_body(response, MAX_BODY_CHARS).await?;
        if truncated {
            body.push_str("\n... [body truncated]");
        }
        Ok(ToolOutput::text(format!("Status: {status}\n\n{body}")))
    }
}

pub fn fetch_tool(ctx: Arc<ToolContext>) -> ToolDescriptor {
    ToolDescriptor::new(
        "fetch",
        "HTTP GET a URL and return the response body. Input is a URL or {\"url\": ...}.",
        Arc::new(UrlValidator),
        Arc::new(FetchExecutor { ctx }),
    )
    .with_parameters(json!({
        "type": "object",
        "properties": {
            "url": { "type": "string", "description": "http(s) URL to fetch." }
        },
        "required": ["url"]
    }))
}
