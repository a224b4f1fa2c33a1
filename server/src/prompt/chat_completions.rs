//! OpenAI style `/chat/completions` endpoints (Mistral, DeepSeek).

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{LlmClient, PromptOutput, TokenUsage};
use crate::{
    error::{AppError, AppResult},
    rate_limiters::RateLimiters,
    server_config::ProviderConfig,
    HttpClient,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    /// `stop`, `length`, `model_length`... kept raw, providers disagree on the set
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: PromptUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
    Nested { error: ChatApiError },
}

pub struct ChatCompletionsClient {
    http_client: HttpClient,
    rate_limiters: RateLimiters,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl ChatCompletionsClient {
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

    fn body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": &self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "response_format": {
                "type": "json_object",
            }
        })
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    message.to_lowercase().contains("rate limit")
}

/// Turns a raw response body into the first choice's text and its usage.
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

    let parsed = serde_json::from_str::<ChatApiResponseOrError>(body)
        .with_context(|| format!("Could not parse chat response ({}): {}", status, body))?;

    let parsed = match parsed {
        ChatApiResponseOrError::Error(error) | ChatApiResponseOrError::Nested { error } => {
            if is_rate_limit_message(&error.message) {
                rate_limiters.trigger_backoff();
                return Err(AppError::TooManyRequests);
            }
            return Err(anyhow!("Chat API error ({}): {:?}", status, error).into());
        }
        ChatApiResponseOrError::Response(parsed) => parsed,
    };

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .context("No choices in response")?;

    Ok(PromptOutput {
        content: choice.message.content,
        usage: TokenUsage {
            input: parsed.usage.prompt_tokens,
            output: parsed.usage.completion_tokens,
        },
    })
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> AppResult<PromptOutput> {
        self.rate_limiters.acquire_one().await;

        let resp = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(prompt))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        tracing::debug!(model = %self.model, %status, "Chat completion returned");
        parse_response(status, &body, &self.rate_limiters)
    }
}
