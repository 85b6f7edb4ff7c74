//! OpenAI-compatible chat-completions client.
//!
//! HTTP mechanics (client construction, header setup, status-code handling)
//! follow `ClaudeProvider`'s LLM provider module; this client targets the
//! `/v1/chat/completions` shape rather than Anthropic's Messages API, and
//! has no streaming path since extraction wants one complete JSON object
//! per call.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::error::LlmError;
use crate::prompt::AssembledPrompt;
use crate::repair::parse_with_repair;

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    breaker: Arc<CircuitBreaker>,
}

impl LlmClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout_ms: u64,
        max_tokens: u32,
        temperature: f32,
        circuit_threshold: u32,
        circuit_cooldown_s: u64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            temperature,
            breaker: Arc::new(CircuitBreaker::new(circuit_threshold, circuit_cooldown_s)),
        }
    }

    /// Call the chat-completions endpoint and return the parsed JSON object
    /// the model produced, applying code-fence stripping and a repair pass
    /// before giving up.
    pub async fn extract(&self, prompt: &AssembledPrompt) -> Result<Value, LlmError> {
        if !self.breaker.allow_call() {
            return Err(LlmError::CircuitOpen);
        }

        let result = self.call(prompt).await;
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }

    async fn call(&self, prompt: &AssembledPrompt) -> Result<Value, LlmError> {
        let request = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "LLM endpoint returned an error");
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionsResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(len = content.len(), "Received LLM completion");
        parse_with_repair(&content).ok_or_else(|| LlmError::InvalidJson(content))
    }

    #[cfg(test)]
    pub(crate) fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_starts_closed() {
        let client = LlmClient::new("http://localhost", "key", "model", 1000, 512, 0.0, 5, 60);
        assert!(client.breaker().allow_call());
    }
}
