use std::str::FromStr;

use crate::{
    db_core::prelude::*,
    error::AppResult,
    prompt::{LlmProvider, LlmSelection},
    server_config::cfg,
};

pub struct PreferenceCtrl;

/// The preference fields the knowledge features need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreference {
    pub language: String,
    pub llm: LlmSelection,
}

impl UserPreference {
    pub fn from_model(model: Option<preference::Model>) -> Self {
        let default_provider = cfg.llm.default_provider;
        let Some(model) = model else {
            return Self {
                language: cfg.settings.default_language.clone(),
                llm: LlmSelection {
                    provider: default_provider,
                    model: None,
                },
            };
        };

        let parsed = match model.llm_provider.as_deref() {
            None | Some("") => None,
            Some(name) => LlmProvider::from_str(name)
                .map_err(|_| {
                    tracing::warn!(
                        "Unsupported llm provider {:?} for user {}, using {}",
                        name,
                        model.user_id,
                        default_provider
                    )
                })
                .ok(),
        };
        // A model name only makes sense for the provider it was chosen for
        let (provider, llm_model) = match parsed {
            Some(provider) => (provider, model.llm_model),
            None => (default_provider, None),
        };

        Self {
            language: model.language,
            llm: LlmSelection {
                provider,
                model: llm_model,
            },
        }
    }
}

impl PreferenceCtrl {
    pub async fn get_or_default(
        conn: &DatabaseConnection,
        user_id: i32,
    ) -> AppResult<UserPreference> {
        let model = Preference::find()
            .filter(preference::Column::UserId.eq(user_id))
            .one(conn)
            .await?;

        Ok(UserPreference::from_model(model))
    }
}
