use axum::{
    extract::{Path, State},
    Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    auth::jwt::Claims,
    error::{AppJsonResult, AppResult},
    knowledge::{
        summary::{summarize, EmailContent, Summary},
        tree::{Categories, KnowledgeTree},
    },
    model::{
        email::EmailCtrl, key_point::KeyPointCtrl, preference::PreferenceCtrl,
        statistics::StatisticsCtrl,
    },
    prompt::TokenUsage,
    server_config::cfg,
    ServerState,
};

async fn load_tree(conn: &DatabaseConnection, user_id: i32) -> AppResult<KnowledgeTree> {
    let rows = KeyPointCtrl::rows_for_user(conn, user_id).await?;
    Ok(KnowledgeTree::from_rows(rows))
}

/// Cuts `body` down to at most `max_chars` characters.
fn truncate_chars(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// # GET /knowledge/categories
pub async fn get_categories(
    claims: Claims,
    State(conn): State<DatabaseConnection>,
) -> AppJsonResult<Categories> {
    let tree = load_tree(&conn, claims.sub).await?;
    Ok(Json(tree.get_categories()))
}

/// # GET /knowledge/tree
pub async fn get_tree(
    claims: Claims,
    State(conn): State<DatabaseConnection>,
) -> AppJsonResult<KnowledgeTree> {
    let tree = load_tree(&conn, claims.sub).await?;
    Ok(Json(tree))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeEmailBody {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub user_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeEmailResponse {
    pub email_id: i32,
    pub summary: Summary,
    pub categories: Categories,
}

/// # POST /knowledge/emails/:email_id/summarize
///
/// Summarises an email into keypoints and files them in the user's tree.
/// Summarising the same email again replaces its keypoints.
///
/// Request body:
/// - `subject`, `body`: the email (or the whole thread when `isReply`)
/// - `isReply`: summarise message by message
/// - `userDescription`: optional text about the user to steer the keypoints
pub async fn summarize_email(
    claims: Claims,
    State(state): State<ServerState>,
    Path(email_id): Path<i32>,
    Json(body): Json<SummarizeEmailBody>,
) -> AppJsonResult<SummarizeEmailResponse> {
    let user_id = claims.sub;
    let email = EmailCtrl::get_for_user(&state.conn, user_id, email_id).await?;

    let rows = KeyPointCtrl::rows_for_user(&state.conn, user_id).await?;
    let categories = KnowledgeTree::from_rows(rows.iter().cloned()).get_categories();
    let preference = PreferenceCtrl::get_or_default(&state.conn, user_id).await?;
    let llm = (state.llm_factory)(&preference.llm);

    let content = EmailContent {
        subject: body.subject.trim(),
        body: truncate_chars(&body.body, cfg.knowledge.max_body_chars),
        user_description: body
            .user_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty()),
        is_reply: body.is_reply,
    };

    let mut usage = TokenUsage::default();
    let summary = summarize(
        llm.as_ref(),
        &categories,
        content,
        &preference.language,
        &mut usage,
    )
    .await;
    StatisticsCtrl::add_token_usage(&state.conn, user_id, usage).await?;
    let summary = summary?;

    let stored = KeyPointCtrl::replace_for_email(&state.conn, email.id, &summary).await?;

    // the email's previous keypoints were just replaced
    let mut tree = KnowledgeTree::from_rows(
        rows.into_iter()
            .filter(|row| row.provider_id != email.provider_id),
    );
    summary.apply_to(&mut tree, &email.provider_id);
    tracing::info!(
        "Stored {} keypoints for email {} of user {} under {} / {} / {}",
        stored,
        email.id,
        user_id,
        summary.category,
        summary.organization,
        summary.topic
    );

    Ok(Json(SummarizeEmailResponse {
        email_id: email.id,
        summary,
        categories: tree.get_categories(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteKeypointsResponse {
    pub deleted: u64,
}

/// # DELETE /knowledge/emails/:email_id
///
/// Removes an email from the user's tree.
pub async fn delete_email_keypoints(
    claims: Claims,
    State(conn): State<DatabaseConnection>,
    Path(email_id): Path<i32>,
) -> AppJsonResult<DeleteKeypointsResponse> {
    let email = EmailCtrl::get_for_user(&conn, claims.sub, email_id).await?;
    let deleted = KeyPointCtrl::delete_for_email(&conn, email.id).await?;

    Ok(Json(DeleteKeypointsResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_summarize_body_defaults() {
        let body: SummarizeEmailBody =
            serde_json::from_str(r#"{"subject": "Invoice", "body": "Pay by Friday"}"#).unwrap();
        assert!(!body.is_reply);
        assert!(body.user_description.is_none());

        let body: SummarizeEmailBody = serde_json::from_str(
            r#"{"subject": "Re: Invoice", "body": "...", "isReply": true, "userDescription": "Designer"}"#,
        )
        .unwrap();
        assert!(body.is_reply);
        assert_eq!(body.user_description.as_deref(), Some("Designer"));
    }
}
