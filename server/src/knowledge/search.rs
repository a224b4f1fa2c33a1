use serde::Serialize;

use super::tree::{Categories, KeypointSelection, KnowledgeTree};
use crate::{
    error::AppResult,
    prompt::{
        knowledge::{answer_prompt, select_categories_prompt, AnswerResponse},
        parse_json, LlmClient, TokenUsage,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchAnswer {
    pub sure: bool,
    pub answer: String,
    /// Provider ids of the emails the answer was drawn from
    pub provider_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    NotEnoughData,
    Answered(SearchAnswer),
}

/// One question asked against one user's knowledge tree.
pub struct Search<'a> {
    user_id: i32,
    question: &'a str,
    tree: &'a KnowledgeTree,
    llm: &'a dyn LlmClient,
    usage: TokenUsage,
}

impl<'a> Search<'a> {
    pub fn new(
        user_id: i32,
        question: &'a str,
        tree: &'a KnowledgeTree,
        llm: &'a dyn LlmClient,
    ) -> Self {
        Self {
            user_id,
            question,
            tree,
            llm,
            usage: TokenUsage::default(),
        }
    }

    pub fn can_answer(&self) -> bool {
        self.tree.can_answer()
    }

    /// Lets the model pick the categories and organizations worth reading.
    pub async fn get_selected_categories(&mut self) -> AppResult<Categories> {
        let prompt = select_categories_prompt(&self.tree.get_categories(), self.question);
        let output = self.llm.complete(&prompt).await?;
        self.usage += output.usage;

        parse_json::<Categories>(&output.content).inspect_err(|e| {
            tracing::error!("Could not select categories for user {}: {}", self.user_id, e)
        })
    }

    pub async fn get_answer(
        &mut self,
        keypoints: &KeypointSelection,
        language: &str,
    ) -> AppResult<AnswerResponse> {
        let prompt = answer_prompt(keypoints, self.question, language);
        let output = self.llm.complete(&prompt).await?;
        self.usage += output.usage;

        parse_json::<AnswerResponse>(&output.content).inspect_err(|e| {
            tracing::error!("Could not answer question for user {}: {}", self.user_id, e)
        })
    }

    /// Tokens spent so far, including calls whose reply could not be used.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Runs the whole flow. Check [`Search::usage`] afterwards, whatever the
    /// result, to account for the tokens spent.
    pub async fn run(&mut self, language: &str) -> AppResult<SearchOutcome> {
        if !self.can_answer() {
            tracing::info!("User {} has no knowledge to search yet", self.user_id);
            return Ok(SearchOutcome::NotEnoughData);
        }

        let selected = self.get_selected_categories().await?;
        let keypoints = self.tree.get_keypoints(&selected);
        if keypoints.is_empty() {
            tracing::info!(
                "No keypoints matched the selection {:?} for user {}",
                selected,
                self.user_id
            );
            return Ok(SearchOutcome::NotEnoughData);
        }

        let AnswerResponse { sure, answer } = self.get_answer(&keypoints, language).await?;
        let provider_ids = self.tree.email_ids(&keypoints);

        Ok(SearchOutcome::Answered(SearchAnswer {
            sure,
            answer,
            provider_ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, testing::common::FakeLlm};

    fn tree() -> KnowledgeTree {
        let mut tree = KnowledgeTree::new();
        tree.add_user_data(
            "Studies",
            "ESAIP",
            "Semester 4",
            ["ends around mid-June", "erasmus"],
            ["gm-1", "gm-2"],
        );
        tree.add_user_data("Work", "Acme", "Payroll", ["paid on the 28th"], ["gm-3"]);
        tree
    }

    #[tokio::test]
    async fn test_empty_tree_skips_llm() {
        let llm = FakeLlm::new(Vec::<&str>::new());
        let tree = KnowledgeTree::new();

        let mut search = Search::new(1, "When is payday?", &tree, &llm);
        let outcome = search.run("English").await.unwrap();

        assert_eq!(outcome, SearchOutcome::NotEnoughData);
        assert_eq!(search.usage(), TokenUsage::default());
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_answered() {
        let llm = FakeLlm::new([
            r#"{"Studies": ["ESAIP"]}"#,
            r#"```json
            {"sure": true, "answer": "Mid-June"}
            ```"#,
        ]);
        let tree = tree();

        let mut search = Search::new(1, "When does the semester end?", &tree, &llm);
        let outcome = search.run("English").await.unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::Answered(SearchAnswer {
                sure: true,
                answer: "Mid-June".to_string(),
                provider_ids: vec!["gm-1".to_string(), "gm-2".to_string()],
            })
        );
        assert_eq!(
            search.usage(),
            TokenUsage {
                input: FakeLlm::USAGE.input * 2,
                output: FakeLlm::USAGE.output * 2,
            }
        );

        let prompts = llm.prompts();
        assert!(prompts[0].contains(r#""Work":["Acme"]"#));
        assert!(prompts[1].contains("ends around mid-June"));
        assert!(!prompts[1].contains("paid on the 28th"));
    }

    #[tokio::test]
    async fn test_selection_outside_tree() {
        let llm = FakeLlm::new([r#"{"Travel": ["SNCF"], "Work": ["Globex"]}"#]);
        let tree = tree();

        let mut search = Search::new(1, "When is my train?", &tree, &llm);
        let outcome = search.run("English").await.unwrap();

        assert_eq!(outcome, SearchOutcome::NotEnoughData);
        assert_eq!(search.usage(), FakeLlm::USAGE);
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let llm = FakeLlm::new(["{}"]);
        let tree = tree();

        let outcome = Search::new(1, "What is the weather?", &tree, &llm)
            .run("English")
            .await
            .unwrap();
        assert_eq!(outcome, SearchOutcome::NotEnoughData);
    }

    #[tokio::test]
    async fn test_unsure_answer_defaults() {
        let llm = FakeLlm::new([r#"{"Work": ["Acme"]}"#, r#"{"answer": "Probably the 28th"}"#]);
        let tree = tree();

        let outcome = Search::new(1, "When is payday?", &tree, &llm)
            .run("English")
            .await
            .unwrap();

        let SearchOutcome::Answered(answer) = outcome else {
            panic!("expected an answer");
        };
        assert!(!answer.sure);
        assert_eq!(answer.provider_ids, vec!["gm-3"]);
    }

    #[tokio::test]
    async fn test_malformed_answer() {
        let llm = FakeLlm::new([r#"{"Work": ["Acme"]}"#, "The 28th, I think."]);
        let tree = tree();

        let mut search = Search::new(1, "When is payday?", &tree, &llm);
        let result = search.run("English").await;
        assert!(matches!(result, Err(AppError::LlmFormat(_))));
        // both calls were billed even though the answer was unusable
        assert_eq!(
            search.usage(),
            TokenUsage {
                input: FakeLlm::USAGE.input * 2,
                output: FakeLlm::USAGE.output * 2,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_selection_keeps_usage() {
        let llm = FakeLlm::new(["Work and Studies, probably."]);
        let tree = tree();

        let mut search = Search::new(1, "When is payday?", &tree, &llm);
        assert!(search.run("English").await.is_err());
        assert_eq!(search.usage(), FakeLlm::USAGE);
    }
}
