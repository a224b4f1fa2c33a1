//! Per-user knowledge tree.
//!
//! Keypoints extracted from emails are filed under
//! `category -> organization -> topic`. The tree serialises to the nested
//! JSON shape the frontend and the prompts expect:
//!
//! ```json
//! {
//!   "Studies": {
//!     "organizations": {
//!       "ESAIP": {
//!         "topics": {
//!           "Semester 4": {
//!             "keypoints": ["ends around mid-June", "erasmus"],
//!             "emails": ["id_email1", "id_email2"]
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::key_point::KeyPointRow;

/// `{category: [organization]}`
pub type Categories = IndexMap<String, Vec<String>>;

/// `{category: {organization: {topic: {keypoints}}}}`
pub type KeypointSelection = IndexMap<String, IndexMap<String, IndexMap<String, TopicKeypoints>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TopicLists")]
pub struct TopicNode {
    pub keypoints: Vec<String>,
    pub emails: Vec<String>,
    /// Lowercased `keypoints`, for duplicate checks
    #[serde(skip)]
    seen_keypoints: HashSet<String>,
    #[serde(skip)]
    seen_emails: HashSet<String>,
}

#[derive(Deserialize)]
struct TopicLists {
    #[serde(default)]
    keypoints: Vec<String>,
    #[serde(default)]
    emails: Vec<String>,
}

impl From<TopicLists> for TopicNode {
    fn from(lists: TopicLists) -> Self {
        let mut node = TopicNode::default();
        node.add(lists.keypoints, lists.emails);
        node
    }
}

impl TopicNode {
    fn add<K, E>(&mut self, keypoints: K, emails: E)
    where
        K: IntoIterator,
        K::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        merge_case_insensitive(&mut self.keypoints, &mut self.seen_keypoints, keypoints);
        merge_case_insensitive(&mut self.emails, &mut self.seen_emails, emails);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationNode {
    pub topics: IndexMap<String, TopicNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub organizations: IndexMap<String, OrganizationNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicKeypoints {
    pub keypoints: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeTree(IndexMap<String, CategoryNode>);

/// Appends the items of `incoming` that are not already in `target`,
/// comparing case-insensitively. The first spelling seen is kept.
/// `seen` holds the lowercased items of `target` and is kept in step.
fn merge_case_insensitive<I, S>(target: &mut Vec<String>, seen: &mut HashSet<String>, incoming: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for item in incoming {
        let item = item.into();
        if seen.insert(item.to_lowercase()) {
            target.push(item);
        }
    }
}

impl KnowledgeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tree from stored keypoint rows, in row order.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = KeyPointRow>,
    {
        let mut tree = Self::new();
        for row in rows {
            tree.add_user_data(
                &row.category,
                &row.organization,
                &row.topic,
                [row.content],
                [row.provider_id],
            );
        }
        tree
    }

    /// Files keypoints and the emails they came from under
    /// `category -> organization -> topic`, creating missing levels.
    /// Keypoints and emails already present (ignoring case) are skipped,
    /// so adding the same data twice leaves the tree unchanged.
    pub fn add_user_data<K, E>(
        &mut self,
        category: &str,
        organization: &str,
        topic: &str,
        keypoints: K,
        emails: E,
    ) where
        K: IntoIterator,
        K::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        self.0
            .entry(category.to_string())
            .or_default()
            .organizations
            .entry(organization.to_string())
            .or_default()
            .topics
            .entry(topic.to_string())
            .or_default()
            .add(keypoints, emails);
    }

    /// Flattens the tree into `{category: [organization]}`.
    pub fn get_categories(&self) -> Categories {
        self.0
            .iter()
            .map(|(category, node)| {
                (
                    category.clone(),
                    node.organizations.keys().cloned().collect(),
                )
            })
            .collect()
    }

    /// Keypoints of every topic under the selected categories and
    /// organizations. Names missing from the tree are ignored, and
    /// categories left without any organization are dropped.
    pub fn get_keypoints(&self, selected: &Categories) -> KeypointSelection {
        let mut keypoints = KeypointSelection::new();

        for (category, organizations) in selected {
            let Some(category_node) = self.0.get(category) else {
                tracing::debug!("Selected category {:?} is not in the tree", category);
                continue;
            };

            let mut by_organization = IndexMap::new();
            for organization in organizations {
                let Some(organization_node) = category_node.organizations.get(organization) else {
                    tracing::debug!(
                        "Selected organization {:?} is not under {:?}",
                        organization,
                        category
                    );
                    continue;
                };

                let topics = organization_node
                    .topics
                    .iter()
                    .map(|(topic, node)| {
                        (
                            topic.clone(),
                            TopicKeypoints {
                                keypoints: node.keypoints.clone(),
                            },
                        )
                    })
                    .collect::<IndexMap<_, _>>();
                by_organization.insert(organization.clone(), topics);
            }

            if !by_organization.is_empty() {
                keypoints.insert(category.clone(), by_organization);
            }
        }

        keypoints
    }

    /// Provider ids of the emails behind every topic of `selection`.
    pub fn email_ids(&self, selection: &KeypointSelection) -> Vec<String> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for (category, organizations) in selection {
            for (organization, topics) in organizations {
                for topic in topics.keys() {
                    if let Some(node) = self.topic(category, organization, topic) {
                        merge_case_insensitive(&mut ids, &mut seen, node.emails.iter().cloned());
                    }
                }
            }
        }
        ids
    }

    pub fn topic(&self, category: &str, organization: &str, topic: &str) -> Option<&TopicNode> {
        self.0
            .get(category)?
            .organizations
            .get(organization)?
            .topics
            .get(topic)
    }

    /// True when there is anything at all to search through.
    pub fn can_answer(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn keypoint_count(&self) -> usize {
        self.0
            .values()
            .flat_map(|c| c.organizations.values())
            .flat_map(|o| o.topics.values())
            .map(|t| t.keypoints.len())
            .sum()
    }
}
