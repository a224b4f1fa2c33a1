use serde::Serialize;

use super::tree::{Categories, KnowledgeTree};
use crate::{
    error::AppResult,
    prompt::{
        knowledge::{
            summarize_conversation_prompt, summarize_email_prompt, ConversationSummaryResponse,
            EmailSummaryResponse,
        },
        parse_json, LlmClient, TokenUsage,
    },
};

pub const UNKNOWN: &str = "Unknown";

/// The email to file into the knowledge tree.
#[derive(Debug, Clone, Copy)]
pub struct EmailContent<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub user_description: Option<&'a str>,
    pub is_reply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryKeypoint {
    /// Message index inside a reply thread
    pub position: Option<i32>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub category: String,
    pub organization: String,
    pub topic: String,
    pub is_reply: bool,
    pub keypoints: Vec<SummaryKeypoint>,
}

fn label_or_unknown(label: String) -> String {
    let label = label.trim();
    if label.is_empty() {
        UNKNOWN.to_string()
    } else {
        label.to_string()
    }
}

fn clean_keypoint(keypoint: String) -> Option<String> {
    let keypoint = keypoint.trim();
    (!keypoint.is_empty()).then(|| keypoint.to_string())
}

impl From<EmailSummaryResponse> for Summary {
    fn from(resp: EmailSummaryResponse) -> Self {
        Summary {
            category: label_or_unknown(resp.category),
            organization: label_or_unknown(resp.organization),
            topic: label_or_unknown(resp.topic),
            is_reply: false,
            keypoints: resp
                .keypoints
                .into_iter()
                .filter_map(clean_keypoint)
                .map(|content| SummaryKeypoint {
                    position: None,
                    content,
                })
                .collect(),
        }
    }
}

impl From<ConversationSummaryResponse> for Summary {
    fn from(resp: ConversationSummaryResponse) -> Self {
        let keypoints = resp
            .keypoints
            .into_iter()
            .enumerate()
            .flat_map(|(index, (key, keypoints))| {
                // keys are "1", "2"... but fall back to order if the model improvises
                let position = key.trim().parse::<i32>().unwrap_or(index as i32 + 1);
                keypoints
                    .into_iter()
                    .filter_map(clean_keypoint)
                    .map(move |content| SummaryKeypoint {
                        position: Some(position),
                        content,
                    })
            })
            .collect();

        Summary {
            category: label_or_unknown(resp.category),
            organization: label_or_unknown(resp.organization),
            topic: label_or_unknown(resp.topic),
            is_reply: true,
            keypoints,
        }
    }
}

impl Summary {
    /// Files this summary into `tree` under the email's provider id.
    pub fn apply_to(&self, tree: &mut KnowledgeTree, provider_id: &str) {
        tree.add_user_data(
            &self.category,
            &self.organization,
            &self.topic,
            self.keypoints.iter().map(|k| k.content.clone()),
            [provider_id],
        );
    }
}

/// Asks the model to classify a single email and boil it down to keypoints.
/// The existing categories are part of the prompt so the model files the
/// email next to related ones instead of inventing new names.
/// Tokens are added to `usage` as soon as the model replies.
pub async fn summarize_email(
    llm: &dyn LlmClient,
    categories: &Categories,
    content: EmailContent<'_>,
    language: &str,
    usage: &mut TokenUsage,
) -> AppResult<Summary> {
    let prompt = summarize_email_prompt(
        content.subject,
        content.body,
        content.user_description,
        categories,
        language,
    );
    let output = llm.complete(&prompt).await?;
    *usage += output.usage;
    Ok(parse_json::<EmailSummaryResponse>(&output.content)?.into())
}

/// Same as [`summarize_email`] for a reply thread, keypoints are kept per message.
pub async fn summarize_conversation(
    llm: &dyn LlmClient,
    categories: &Categories,
    content: EmailContent<'_>,
    language: &str,
    usage: &mut TokenUsage,
) -> AppResult<Summary> {
    let prompt = summarize_conversation_prompt(
        content.subject,
        content.body,
        content.user_description,
        categories,
        language,
    );
    let output = llm.complete(&prompt).await?;
    *usage += output.usage;
    Ok(parse_json::<ConversationSummaryResponse>(&output.content)?.into())
}

pub async fn summarize(
    llm: &dyn LlmClient,
    categories: &Categories,
    content: EmailContent<'_>,
    language: &str,
    usage: &mut TokenUsage,
) -> AppResult<Summary> {
    if content.is_reply {
        summarize_conversation(llm, categories, content, language, usage).await
    } else {
        summarize_email(llm, categories, content, language, usage).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::common::FakeLlm;

    fn email<'a>(is_reply: bool) -> EmailContent<'a> {
        EmailContent {
            subject: "Semester 4 schedule",
            body: "The semester ends around mid-June. Erasmus applications are open.",
            user_description: Some("Student at ESAIP"),
            is_reply,
        }
    }

    #[tokio::test]
    async fn test_summarize_single_email() {
        let llm = FakeLlm::new([r#"```json
            {"category": "Studies", "organization": "ESAIP", "topic": "Semester 4",
             "keypoints": ["ends around mid-June", "  ", "erasmus"]}
            ```"#]);
        let categories = Categories::from([("Studies".to_string(), vec!["ESAIP".to_string()])]);

        let mut usage = TokenUsage::default();
        let summary = summarize(&llm, &categories, email(false), "English", &mut usage)
            .await
            .unwrap();

        assert_eq!(summary.category, "Studies");
        assert!(!summary.is_reply);
        assert_eq!(
            summary.keypoints,
            vec![
                SummaryKeypoint { position: None, content: "ends around mid-June".to_string() },
                SummaryKeypoint { position: None, content: "erasmus".to_string() },
            ]
        );
        assert_eq!(usage, FakeLlm::USAGE);

        let prompts = llm.prompts();
        assert!(prompts[0].contains(r#"{"Studies":["ESAIP"]}"#));
        assert!(prompts[0].contains("Student at ESAIP"));
    }

    #[tokio::test]
    async fn test_summarize_conversation_keeps_positions() {
        let llm = FakeLlm::new([r#"{"category": "Work", "organization": "", "topic": "Hiring",
            "keypoints": {"1": ["interview Friday"], "2": ["bring ID", "10am"], "last": ["confirmed"]}}"#]);

        let summary = summarize(
            &llm,
            &Categories::new(),
            email(true),
            "English",
            &mut TokenUsage::default(),
        )
        .await
        .unwrap();

        assert!(summary.is_reply);
        assert_eq!(summary.organization, UNKNOWN);
        let positions = summary
            .keypoints
            .iter()
            .map(|k| (k.position, k.content.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            positions,
            vec![
                (Some(1), "interview Friday"),
                (Some(2), "bring ID"),
                (Some(2), "10am"),
                (Some(3), "confirmed"),
            ]
        );
    }

    #[test]
    fn test_apply_to_tree() {
        let summary = Summary {
            category: "Bills".to_string(),
            organization: "EDF".to_string(),
            topic: "Electricity".to_string(),
            is_reply: false,
            keypoints: vec![SummaryKeypoint {
                position: None,
                content: "due on the 5th".to_string(),
            }],
        };

        let mut tree = KnowledgeTree::new();
        summary.apply_to(&mut tree, "gm-42");
        summary.apply_to(&mut tree, "gm-42");

        let topic = tree.topic("Bills", "EDF", "Electricity").unwrap();
        assert_eq!(topic.keypoints, vec!["due on the 5th"]);
        assert_eq!(topic.emails, vec!["gm-42"]);
    }

    #[tokio::test]
    async fn test_summarize_rejects_non_json() {
        let llm = FakeLlm::new(["Sorry, I can't summarize that."]);
        let mut usage = TokenUsage::default();
        let result = summarize(&llm, &Categories::new(), email(false), "English", &mut usage).await;
        assert!(result.is_err());
        assert_eq!(usage, FakeLlm::USAGE);
    }
}
