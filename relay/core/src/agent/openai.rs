//! OpenAI-compatible Agent
//!
//! Agent backed by any server implementing the `/chat/completions` API
//! (hosted inference endpoints, local gateways, tool-calling proxies).
//!
//! # API
//!
//! - `POST /chat/completions` - one non-streaming completion per request
//! - `GET /models` - used as the health check
//!
//! Providers that expose reasoning separately (`reasoning_content` on the
//! message) have it surfaced as a thinking progress event.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::{Agent, AgentConfig, AgentError, AgentRequest};
use crate::progress::{ProgressEvent, ProgressSender};

/// Emitted before the backend is called
pub const CALLING_MESSAGE: &str = "🤖 正在调用AI助手分析请求...";
/// Emitted once the backend has answered
pub const FINISHED_MESSAGE: &str = "✅ 处理完成，正在整理结果...";

/// Longest error body kept in [`AgentError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Chat-completions agent client
#[derive(Clone)]
pub struct ChatCompletionsAgent {
    config: AgentConfig,
    /// HTTP client
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

impl ChatCompletionsAgent {
    /// Create from `AgentConfig`
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl Agent for ChatCompletionsAgent {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> bool {
        let url = self.endpoint("models");
        match self.authorize(self.http_client.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "Agent health check failed");
                false
            }
        }
    }

    async fn invoke(
        &self,
        request: &AgentRequest,
        emit: &ProgressSender,
    ) -> Result<String, AgentError> {
        let url = self.endpoint("chat/completions");
        let system = request
            .system
            .as_deref()
            .or(self.config.system_prompt.as_deref());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.message,
        });

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        emit.emit(CALLING_MESSAGE);
        tracing::debug!(
            request_id = %request.request_id,
            model = %self.config.model,
            url = %url,
            "Calling chat completions"
        );

        let response = self
            .authorize(self.http_client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|source| AgentError::Request {
                endpoint: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AgentError::InvalidResponse("no choices in response".to_string()))?;

        if let Some(reasoning) = message
            .reasoning_content
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        {
            emit.push(ProgressEvent::thinking(reasoning));
        }

        emit.emit(FINISHED_MESSAGE);
        Ok(message.content.unwrap_or_default())
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressChannel, ProgressKind};
    use std::time::Duration;

    fn config(base_url: &str) -> AgentConfig {
        AgentConfig {
            base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(2),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let agent = ChatCompletionsAgent::from_config(&config("http://localhost:9/v1/")).unwrap();
        assert_eq!(
            agent.endpoint("chat/completions"),
            "http://localhost:9/v1/chat/completions"
        );
        assert_eq!(agent.name(), crate::agent::traits::DEFAULT_MODEL);
    }

    #[test]
    fn test_parse_response_with_reasoning() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"done.","reasoning_content":"checking"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let message = &parsed.choices[0].message;
        assert_eq!(message.content.as_deref(), Some("done."));
        assert_eq!(message.reasoning_content.as_deref(), Some("checking"));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let mut text = "错误信息".to_string();
        truncate_at_char_boundary(&mut text, 4);
        assert_eq!(text, "错");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_request_error() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let agent = ChatCompletionsAgent::from_config(&config("http://127.0.0.1:9/v1")).unwrap();
        let mut channel = ProgressChannel::new();

        let result = agent
            .invoke(&AgentRequest::new("hi"), &channel.sender())
            .await;
        assert!(matches!(result, Err(AgentError::Request { .. })));
        assert!(!agent.health_check().await);

        let emitted = channel.drain_all();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].text(), CALLING_MESSAGE);
        assert_eq!(emitted[0].kind(), ProgressKind::Progress);
    }
}
