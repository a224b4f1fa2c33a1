pub(crate) mod anthropic;
pub(crate) mod chat_completions;
pub(crate) mod json;
pub(crate) mod knowledge;

use std::{ops::AddAssign, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    error::{AppError, AppResult},
    rate_limiters::RateLimiters,
    server_config::cfg,
    HttpClient,
};

pub use json::extract_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LlmProvider {
    Mistral,
    Deepseek,
    Anthropic,
}

/// Which provider and model a user's prompts go to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSelection {
    pub provider: LlmProvider,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
    }
}

#[derive(Debug, Clone)]
pub struct PromptOutput {
    pub content: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends a single user message and returns the raw text of the reply.
    async fn complete(&self, prompt: &str) -> AppResult<PromptOutput>;
}

/// Builds the client for a user's provider choice. Handlers only see this,
/// so tests can hand the router a scripted client.
pub type LlmFactory = Arc<dyn Fn(&LlmSelection) -> Box<dyn LlmClient> + Send + Sync>;

pub fn provider_factory(http_client: HttpClient, rate_limiters: RateLimiters) -> LlmFactory {
    Arc::new(move |selection| client_for(&http_client, &rate_limiters, selection))
}

fn client_for(
    http_client: &HttpClient,
    rate_limiters: &RateLimiters,
    selection: &LlmSelection,
) -> Box<dyn LlmClient> {
    let provider_cfg = cfg.llm.provider(selection.provider);
    let model = selection
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| provider_cfg.model.clone());

    match selection.provider {
        LlmProvider::Mistral | LlmProvider::Deepseek => {
            Box::new(chat_completions::ChatCompletionsClient::new(
                http_client.clone(),
                rate_limiters.clone(),
                provider_cfg,
                model,
                cfg.llm.temperature,
            ))
        }
        LlmProvider::Anthropic => Box::new(anthropic::AnthropicClient::new(
            http_client.clone(),
            rate_limiters.clone(),
            provider_cfg,
            model,
            cfg.llm.temperature,
        )),
    }
}

/// Parses the JSON object in a model reply into `T`.
pub fn parse_json<T: DeserializeOwned>(content: &str) -> AppResult<T> {
    let value = extract_json(content)?;
    serde_json::from_value::<T>(value)
        .map_err(|e| AppError::LlmFormat(format!("{} in answer: {}", e, content)))
}
