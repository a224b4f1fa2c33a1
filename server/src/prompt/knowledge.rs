//! Prompts behind the knowledge tree: picking categories for a question,
//! answering from keypoints, and turning an email into keypoints.

use indexmap::IndexMap;
use indoc::formatdoc;
use serde::Deserialize;

use crate::knowledge::tree::{Categories, KeypointSelection};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AnswerResponse {
    #[serde(default)]
    pub sure: bool,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSummaryResponse {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub keypoints: Vec<String>,
}

/// Keypoints grouped per message of the thread: `{"1": [..], "2": [..]}`
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSummaryResponse {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub keypoints: IndexMap<String, Vec<String>>,
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn select_categories_prompt(categories: &Categories, question: &str) -> String {
    let categories = to_json(categories);
    formatdoc! {r#"
        You are an email assistant that helps a user to answer their question.

        Email categories and organizations:
        {categories}

        User question:
        {question}

        Choose categories and organizations that have high probability to help the user to find their answer.
        The chosen categories and organizations must be highly relevant. If you hesitate do not add it.
        Only use names that appear in the list above, spelled exactly the same way.
        Do not add any comments nor explain your thinking process.

        ---
        Answer must always be a Json format matching this template:
        {{
            "category1": [selected organizations],
            ...
            "categoryN": [selected organizations]
        }}"#
    }
}

pub fn answer_prompt(keypoints: &KeypointSelection, question: &str, language: &str) -> String {
    let keypoints = to_json(keypoints);
    formatdoc! {r#"
        You are an email assistant that helps a user to answer their question.

        User data:
        {keypoints}

        User question:
        {question}

        If you estimate that the answer is likely to be good, set the boolean field to 'true'.
        Otherwise, set it to 'false' if you think the user is very likely to look for further details.
        The answer must be concise and straight to the point without giving explanations.

        ---
        The answer must always be in Json format matching this template:
        {{
            "sure": bool,
            "answer": "answer to the user question in {language}"
        }}"#
    }
}

pub fn summarize_email_prompt(
    subject: &str,
    body: &str,
    user_description: Option<&str>,
    categories: &Categories,
    language: &str,
) -> String {
    let categories = to_json(categories);
    let user_description = user_description.unwrap_or("");
    formatdoc! {r#"
        As a smart email assistant,
        Summarize the email body in {language} as a list of up to three ultra-concise keypoints (up to seven words each) that encapsulate the core information. This will aid the user in recalling the content of the email.
        The sentences must be highly relevant and should not include minor details or unnecessary information. If in doubt, do not add the keypoint.
        If a user description is clearly provided, use it to enhance the keypoints.
        In {language}: Add a 'category' (one word), an 'organization', and a 'topic' that best describe the email.
        If you hesitate on any of them, or if it is unclear or not explicitly mentioned, set it to 'Unknown'.
        To assist you in categorizing the email, here are the existing categories and organizations: {categories}.
        If you can classify the email within an existing category/organization, do so. If uncertain, create another category/organization in {language}.

        User description:
        {user_description}

        Email subject:
        {subject}

        Email body:
        {body}

        ---
        Answer must always be a Json format matching this template:
        {{
            "category": "",
            "organization": "",
            "topic": "",
            "keypoints": [list of keypoints]
        }}"#
    }
}

pub fn summarize_conversation_prompt(
    subject: &str,
    body: &str,
    user_description: Option<&str>,
    categories: &Categories,
    language: &str,
) -> String {
    let categories = to_json(categories);
    let user_description = user_description.unwrap_or("");
    formatdoc! {r#"
        As a smart email assistant,
        For each email in the following conversation, summarize it in {language} as a list of up to three ultra-concise keypoints (up to seven words) that encapsulate the core information. This will aid the user in recalling the past conversation.
        Increment the number of keys to match the number of emails. The number of keys must STRICTLY correspond to the number of emails.
        The sentence must be highly relevant and not deal with details or unnecessary information. If you hesitate, do not add the keypoint.
        If a user description is clearly provided, use it to enhance the keypoints.
        In {language}: Add a 'category' (one word), an 'organization', and a 'topic' that best describes the conversation.
        If you hesitate on any of them, or if it is unclear or not explicitly mentioned, set it to 'Unknown'.
        To assist you in categorizing the conversation, here are the existing categories and organizations: {categories}.
        If you can classify the conversation in an existing category/organization: Do it. If you hesitate, create another category/organization in {language}.

        User description:
        {user_description}

        Email subject:
        {subject}

        Email conversation:
        {body}

        ---
        Answer must always be a Json format matching this template:
        {{
            "category": "",
            "organization": "",
            "topic": "",
            "keypoints": {{
                "1": [list of keypoints],
                "2": [list of keypoints],
                "n": [list of keypoints]
            }}
        }}"#
    }
}
