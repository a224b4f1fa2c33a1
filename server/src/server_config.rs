use config::{Config, Environment};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path};

use crate::prompt::LlmProvider;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub default_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn api_key(&self) -> String {
        env::var(&self.api_key_env).unwrap_or_else(|_| {
            tracing::warn!("{} is not set, LLM calls will be rejected", self.api_key_env);
            String::new()
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub default_provider: LlmProvider,
    pub temperature: f64,
    pub mistral: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl LlmConfig {
    pub fn provider(&self, provider: LlmProvider) -> &ProviderConfig {
        match provider {
            LlmProvider::Mistral => &self.mistral,
            LlmProvider::Deepseek => &self.deepseek,
            LlmProvider::Anthropic => &self.anthropic,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptLimits {
    pub rate_limit_per_sec: usize,
    pub refill_interval_ms: usize,
    pub refill_amount: usize,
    pub backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub prompt_limits: PromptLimits,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeConfig {
    pub max_body_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    llm: LlmConfig,
    api: ApiConfig,
    knowledge: KnowledgeConfig,
    frontend: FrontendConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub llm: LlmConfig,
    pub api: ApiConfig,
    pub knowledge: KnowledgeConfig,
    pub frontend: FrontendConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nLLM: default={} temperature={}\n{}\n\nAPI: {:?}\n\nKnowledge: {:?}\n\nFrontend: {:?}",
            self.settings,
            self.llm.default_provider,
            self.llm.temperature,
            [
                LlmProvider::Mistral,
                LlmProvider::Deepseek,
                LlmProvider::Anthropic
            ]
            .iter()
            .map(|p| {
                let c = self.llm.provider(*p);
                format!("{} -> {} ({})", p, c.model, c.endpoint)
            })
            .collect::<Vec<_>>()
            .join("\n"),
            self.api,
            self.knowledge,
            self.frontend,
        )
    }
}

fn config_dir() -> String {
    env::var("APP_DIR").unwrap_or_else(|_| {
        let dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
        let dir = Path::new(&dir)
            .parent()
            .expect("Failed to get parent dir")
            .display()
            .to_string();
        format!("{}/config", dir)
    })
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let path = format!("{}/config.toml", config_dir());
        // AOMAIL__LLM__DEFAULT_PROVIDER=anthropic overrides llm.default_provider
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .add_source(Environment::with_prefix("AOMAIL").separator("__"))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            settings,
            llm,
            api,
            knowledge,
            frontend,
        } = cfg_file;

        ServerConfig {
            settings,
            llm,
            api,
            knowledge,
            frontend,
        }
    };
}
