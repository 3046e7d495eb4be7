//! Chat transports for the LLM keyword extractor.
//!
//! A [`ChatTransport`] sends a conversation to a chat model and returns the
//! text of its reply. Two HTTP transports are provided: the hosted DeepSeek
//! chat-completions API and a local Ollama server.

use async_trait::async_trait;
use lexicloud_core::config::{DeepSeekConfig, LlmConfig, OllamaConfig};
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::ApiType;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for chat model endpoints.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the conversation and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Build the transport selected by `llm.api_type`
pub fn transport_from_config(config: &LlmConfig) -> Result<Arc<dyn ChatTransport>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.api_type {
        ApiType::DeepSeek => Ok(Arc::new(DeepSeekTransport::new(config.deepseek.clone(), timeout)?)),
        ApiType::Ollama => Ok(Arc::new(OllamaTransport::new(config.ollama.clone(), timeout)?)),
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LexiError::config(format!("Failed to build HTTP client: {}", e)))
}

fn map_request_error(service: &str, e: reqwest::Error) -> LexiError {
    if e.is_timeout() {
        LexiError::timeout(format!("{} request timed out: {}", service, e))
    } else {
        LexiError::service(format!("{} request failed: {}", service, e))
    }
}

async fn read_reply<T: for<'de> Deserialize<'de>>(service: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(status_error(service, status, &error_text));
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            LexiError::timeout(format!("{} response timed out: {}", service, e))
        } else {
            LexiError::service(format!("Unexpected {} response body: {}", service, e))
        }
    })
}

/// Rejected credentials are a configuration problem; anything else is worth retrying
fn status_error(service: &str, status: StatusCode, body: &str) -> LexiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LexiError::config(format!(
            "{} rejected the credentials ({}): {}",
            service, status, body
        )),
        _ => LexiError::service(format!("{} API error ({}): {}", service, status, body)),
    }
}

/// DeepSeek chat-completions transport.
pub struct DeepSeekTransport {
    client: Client,
    config: DeepSeekConfig,
    api_key: String,
}

#[derive(Serialize)]
struct DeepSeekRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct DeepSeekResponse {
    choices: Vec<DeepSeekChoice>,
}

#[derive(Deserialize)]
struct DeepSeekChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

impl DeepSeekTransport {
    pub fn new(config: DeepSeekConfig, timeout: Duration) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LexiError::config("DeepSeek API key not configured"))?;

        info!("Initialized DeepSeek transport with model: {}", config.model);

        Ok(Self {
            client: build_client(timeout)?,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatTransport for DeepSeekTransport {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Sending {} messages to DeepSeek", messages.len());

        let request = DeepSeekRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error("DeepSeek", e))?;

        let reply: DeepSeekResponse = read_reply("DeepSeek", response).await?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LexiError::malformed("DeepSeek reply has no choices"))
    }
}

/// Ollama chat transport.
pub struct OllamaTransport {
    client: Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: ReplyMessage,
}

impl OllamaTransport {
    pub fn new(config: OllamaConfig, timeout: Duration) -> Result<Self> {
        info!(
            "Initialized Ollama transport at {} with model: {}",
            config.api_base, config.model
        );

        Ok(Self {
            client: build_client(timeout)?,
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatTransport for OllamaTransport {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Sending {} messages to Ollama", messages.len());

        let request = OllamaRequest {
            model: &self.config.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error("Ollama", e))?;

        let reply: OllamaResponse = read_reply("Ollama", response).await?;
        Ok(reply.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors() {
        let err = status_error("DeepSeek", StatusCode::UNAUTHORIZED, "invalid key");
        assert!(matches!(err, LexiError::Config(_)));
        assert!(err.is_fatal());

        let err = status_error("Ollama", StatusCode::BAD_GATEWAY, "");
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_messages_serialize_with_lowercase_roles() {
        let messages = vec![ChatMessage::system("rules"), ChatMessage::user("text")];
        let body = serde_json::to_value(OllamaRequest {
            model: "qwen:7b-chat",
            messages: &messages,
            stream: false,
        })
        .unwrap();

        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "text");
    }

    #[test]
    fn test_deepseek_requires_key() {
        let config = DeepSeekConfig {
            api_key: Some("  ".to_string()),
            ..DeepSeekConfig::default()
        };
        assert!(matches!(
            DeepSeekTransport::new(config, Duration::from_secs(5)),
            Err(LexiError::Config(_))
        ));
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let deepseek = DeepSeekTransport::new(
            DeepSeekConfig {
                api_key: Some("sk-test".to_string()),
                api_base: "https://api.deepseek.com/v1/".to_string(),
                ..DeepSeekConfig::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(deepseek.endpoint(), "https://api.deepseek.com/v1/chat/completions");

        let ollama = OllamaTransport::new(OllamaConfig::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(ollama.endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_reply_shapes_parse() {
        let deepseek: DeepSeekResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"[]"}}]}"#,
        )
        .unwrap();
        assert_eq!(deepseek.choices[0].message.content, "[]");

        let ollama: OllamaResponse = serde_json::from_str(
            r#"{"model":"qwen","message":{"role":"assistant","content":"[1]"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(ollama.message.content, "[1]");
    }
}
