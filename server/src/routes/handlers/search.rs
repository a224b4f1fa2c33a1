use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    auth::jwt::Claims,
    error::{AppError, AppJsonResult},
    knowledge::{
        search::{Search, SearchOutcome},
        tree::KnowledgeTree,
    },
    model::{
        email::EmailCtrl, key_point::KeyPointCtrl, preference::PreferenceCtrl,
        statistics::StatisticsCtrl,
    },
    ServerState,
};

const NOT_ENOUGH_DATA: &str = "Not enough data";

#[derive(Debug, Deserialize)]
pub struct SearchTreeKnowledgeBody {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct KnowledgeAnswer {
    pub sure: bool,
    pub answer: String,
    /// Database ids of the emails the answer came from
    pub ids: Vec<i32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SearchTreeKnowledgeResponse {
    Answer { answer: KnowledgeAnswer },
    Message { message: String },
}

/// # POST /ai/search_tree_knowledge
///
/// Answers a question from the keypoints of the user's emails.
///
/// Request body:
/// - `question`: free text, anything left after trimming is accepted
pub async fn search_tree_knowledge(
    claims: Claims,
    State(state): State<ServerState>,
    Json(body): Json<SearchTreeKnowledgeBody>,
) -> AppJsonResult<SearchTreeKnowledgeResponse> {
    let user_id = claims.sub;
    let question = body.question.as_deref().map(str::trim).unwrap_or_default();
    if question.is_empty() {
        return Err(AppError::BadRequest("No question provided".to_string()));
    }

    let rows = KeyPointCtrl::rows_for_user(&state.conn, user_id).await?;
    let tree = KnowledgeTree::from_rows(rows);
    let preference = PreferenceCtrl::get_or_default(&state.conn, user_id).await?;
    let llm = (state.llm_factory)(&preference.llm);
    tracing::debug!(
        "Searching {} keypoints for user {} with {} ({})",
        tree.keypoint_count(),
        user_id,
        preference.llm.provider,
        state.rate_limiters.get_status()
    );

    let mut search = Search::new(user_id, question, &tree, llm.as_ref());
    let outcome = search.run(&preference.language).await;
    // tokens are billed even when the reply was unusable
    StatisticsCtrl::add_token_usage(&state.conn, user_id, search.usage()).await?;

    let resp = match outcome? {
        SearchOutcome::NotEnoughData => SearchTreeKnowledgeResponse::Message {
            message: NOT_ENOUGH_DATA.to_string(),
        },
        SearchOutcome::Answered(answer) => {
            let ids =
                EmailCtrl::ids_by_provider_ids(&state.conn, user_id, &answer.provider_ids).await?;
            tracing::info!(
                "Answered question for user {} from {} emails (sure: {})",
                user_id,
                ids.len(),
                answer.sure
            );
            SearchTreeKnowledgeResponse::Answer {
                answer: KnowledgeAnswer {
                    sure: answer.sure,
                    answer: answer.answer,
                    ids,
                },
            }
        }
    };

    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_shapes() {
        let answered = SearchTreeKnowledgeResponse::Answer {
            answer: KnowledgeAnswer {
                sure: false,
                answer: "Mid-June".to_string(),
                ids: vec![3, 7],
            },
        };
        assert_eq!(
            serde_json::to_value(&answered).unwrap(),
            json!({"answer": {"sure": false, "answer": "Mid-June", "ids": [3, 7]}})
        );

        let message = SearchTreeKnowledgeResponse::Message {
            message: NOT_ENOUGH_DATA.to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"message": "Not enough data"})
        );
    }
}
