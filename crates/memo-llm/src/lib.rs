//! memo-llm: DeepSeek chat-completions client.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use memo_config::ModelSettings;
use memo_core::ModelClient;
use memo_types::ChatMessage;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0} is not set")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model API returned an empty reply")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint, DeepSeek by
/// default.
pub struct DeepSeekClient {
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl DeepSeekClient {
    pub fn new(api_key: impl Into<String>, settings: &ModelSettings) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            client: reqwest::Client::new(),
        }
    }

    /// Build a client, reading the API key from the configured variable.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, LlmError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(settings.api_key_env.clone()))?;
        Ok(Self::new(api_key, settings))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        tracing::debug!(model = %self.model, messages = messages.len(), "Requesting completion");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = resp.json().await?;
        extract_content(&json)
    }
}

fn extract_content(json: &Value) -> Result<String, LlmError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait]
impl ModelClient for DeepSeekClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        Ok(self.chat(messages).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/v1"), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn settings(base_url: String) -> ModelSettings {
        ModelSettings {
            base_url,
            ..ModelSettings::default()
        }
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "<final>hi</final>"}}]});
        assert_eq!(extract_content(&ok).unwrap(), "<final>hi</final>");

        let empty = json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(extract_content(&empty), Err(LlmError::EmptyResponse)));
        assert!(matches!(
            extract_content(&json!({"choices": []})),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let settings = ModelSettings {
            api_key_env: "MEMO_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ModelSettings::default()
        };
        let err = DeepSeekClient::from_settings(&settings).err().unwrap();
        assert_eq!(err.to_string(), "MEMO_TEST_KEY_THAT_IS_NEVER_SET is not set");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = DeepSeekClient::new("k", &settings("https://api.deepseek.com/v1/".into()));
        assert_eq!(client.endpoint(), "https://api.deepseek.com/v1/chat/completions");
        assert_eq!(client.model(), "deepseek-chat");
    }

    #[tokio::test]
    async fn test_complete_sends_request_and_reads_reply() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"<final>pong</final>"}}]}"#,
        )
        .await;
        let client = DeepSeekClient::new("secret", &settings(base_url));

        let reply = client
            .complete(&[ChatMessage::system("sys"), ChatMessage::user("ping")])
            .await
            .unwrap();
        assert_eq!(reply, "<final>pong</final>");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "ping"}));
        assert!((body["temperature"].as_f64().unwrap() - 0.35).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_complete_reports_status_and_body() {
        let (base_url, _server) =
            serve_once("401 Unauthorized", r#"{"error":{"message":"bad key"}}"#).await;
        let client = DeepSeekClient::new("wrong", &settings(base_url));

        let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
