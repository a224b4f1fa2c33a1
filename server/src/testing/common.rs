use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, Once},
};

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    prompt::{LlmClient, LlmFactory, PromptOutput, TokenUsage},
};

const TEST_JWT_SECRET: &str = "6165726f6d61696c2d746573742d736563726574";

/// Replays canned replies in order and remembers every prompt it was sent.
/// Clones share the same script, so a test keeps a handle on what the
/// router sent through [`FakeLlm::factory`].
#[derive(Clone)]
pub struct FakeLlm {
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeLlm {
    pub const USAGE: TokenUsage = TokenUsage {
        input: 120,
        output: 30,
    };

    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            prompts: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Hands out this client whatever provider the user picked.
    pub fn factory(&self) -> LlmFactory {
        let llm = self.clone();
        Arc::new(move |_| Box::new(llm.clone()))
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, prompt: &str) -> AppResult<PromptOutput> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("FakeLlm ran out of replies")))?;

        Ok(PromptOutput {
            content,
            usage: Self::USAGE,
        })
    }
}

/// Sets a fixed `JWT_SECRET` so tokens can be minted and checked in tests.
pub fn init_jwt_secret() {
    static INIT: Once = Once::new();
    INIT.call_once(|| std::env::set_var("JWT_SECRET", TEST_JWT_SECRET));
}

pub fn bearer_for(user_id: i32, email: &str) -> String {
    init_jwt_secret();
    let token = crate::auth::jwt::generate_dev_token(user_id, email).unwrap();
    format!("Bearer {}", token)
}
