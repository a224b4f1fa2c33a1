use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{LlmClient, PromptOutput, TokenUsage};
use crate::{
    error::{AppError, AppResult},
    rate_limiters::RateLimiters,
    server_config::ProviderConfig,
    HttpClient,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub content: Vec<ContentBlock>,
    pub usage: MessageUsage,
}

#[derive(Debug, Deserialize)]
pub struct MessageError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageResponseOrError {
    Message(MessageResponse),
    Error { error: MessageError },
}

pub struct AnthropicClient {
    http_client: HttpClient,
    rate_limiters: RateLimiters,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        http_client: HttpClient,
        rate_limiters: RateLimiters,
        provider_cfg: &ProviderConfig,
        model: String,
        temperature: f64,
    ) -> Self {
        Self {
            http_client,
            rate_limiters,
            endpoint: provider_cfg.endpoint.clone(),
            api_key: provider_cfg.api_key(),
            model,
            temperature,
            max_tokens: provider_cfg.max_tokens,
        }
    }
}

pub fn parse_response(
    status: StatusCode,
    body: &str,
    rate_limiters: &RateLimiters,
) -> AppResult<PromptOutput> {
    // 429 bodies are not always JSON
    if status == StatusCode::TOO_MANY_REQUESTS {
        rate_limiters.trigger_backoff();
        return Err(AppError::TooManyRequests);
    }

    let parsed = serde_json::from_str::<MessageResponseOrError>(body)
        .with_context(|| format!("Could not parse messages response ({}): {}", status, body))?;

    let message = match parsed {
        MessageResponseOrError::Error { error } => {
            if error.kind == "rate_limit_error" {
                rate_limiters.trigger_backoff();
                return Err(AppError::TooManyRequests);
            }
            return Err(anyhow!("Messages API error ({}): {:?}", status, error).into());
        }
        MessageResponseOrError::Message(message) => message,
    };

    let content = message
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    Ok(PromptOutput {
        content,
        usage: TokenUsage {
            input: message.usage.input_tokens,
            output: message.usage.output_tokens,
        },
    })
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> AppResult<PromptOutput> {
        self.rate_limiters.acquire_one().await;

        let resp = self
            .http_client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": &self.model,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "messages": [{"role": "user", "content": prompt}]
            }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        tracing::debug!(model = %self.model, %status, "Anthropic message returned");
        parse_response(status, &body, &self.rate_limiters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiters() -> RateLimiters {
        RateLimiters::new(10, 100, 1, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_parse_message() {
        let resp = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "{\"Work\": [\"Acme\"]}"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 42, "output_tokens": 9}
        });

        let output = parse_response(StatusCode::OK, &resp.to_string(), &limiters()).unwrap();
        assert_eq!(output.content, "{\"Work\": [\"Acme\"]}");
        assert_eq!(output.usage, TokenUsage { input: 42, output: 9 });
    }

    #[tokio::test]
    async fn test_parse_rate_limit_error() {
        let limiters = limiters();
        let resp = json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "Number of requests has exceeded your rate limit"}
        });

        let result = parse_response(StatusCode::TOO_MANY_REQUESTS, &resp.to_string(), &limiters);
        assert!(matches!(result, Err(AppError::TooManyRequests)));
        assert!(limiters.is_backing_off());
    }

    #[tokio::test]
    async fn test_rate_limit_error_with_other_status() {
        let limiters = limiters();
        let resp = json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "Slow down"}
        });

        let result = parse_response(StatusCode::BAD_REQUEST, &resp.to_string(), &limiters);
        assert!(matches!(result, Err(AppError::TooManyRequests)));
        assert!(limiters.is_backing_off());
    }

    #[tokio::test]
    async fn test_non_json_bodies() {
        let limiters = limiters();
        let result = parse_response(StatusCode::TOO_MANY_REQUESTS, "rate limited", &limiters);
        assert!(matches!(result, Err(AppError::TooManyRequests)));
        assert!(limiters.is_backing_off());

        let result = parse_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "<html>upstream connect error</html>",
            &limiters,
        );
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
