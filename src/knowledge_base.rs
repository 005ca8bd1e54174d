//! KnowledgeBase fixture parameters and scenarios

use crate::fixture::LifecycleFixture;
use crate::harness::Harness;
use crate::kind::KNOWLEDGE_BASE;
use crate::loader::Replacements;
use crate::reference::random_suffix_name;
use crate::scenario::Scenario;
use crate::tags::TagSet;
use crate::Result;
use serde_json::json;
use tracing::info;

pub const DEFAULT_DESCRIPTION: &str = "Test knowledge base for e2e testing";
pub const UPDATED_DESCRIPTION: &str = "Updated test knowledge base description";
pub const DEFAULT_EMBEDDING_MODEL_ARN: &str =
    "arn:aws:bedrock:us-west-2::foundation-model/amazon.titan-embed-text-v1";
pub const DEFAULT_VECTOR_INDEX_NAME: &str = "e2e-index";

/// Values substituted into the `knowledge_base` manifest template.
///
/// `role_arn` and `collection_arn` fall back to the loader's base
/// `KNOWLEDGE_BASE_ROLE_ARN` and `OPENSEARCH_COLLECTION_ARN` replacements.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBaseParams {
    pub name: String,
    pub description: String,
    pub role_arn: Option<String>,
    pub embedding_model_arn: String,
    pub collection_arn: Option<String>,
    pub vector_index_name: String,
    pub tag: (String, String),
}

impl Default for KnowledgeBaseParams {
    fn default() -> Self {
        Self {
            name: random_suffix_name("bedrock-test-kb", 32),
            description: DEFAULT_DESCRIPTION.to_string(),
            role_arn: None,
            embedding_model_arn: DEFAULT_EMBEDDING_MODEL_ARN.to_string(),
            collection_arn: None,
            vector_index_name: DEFAULT_VECTOR_INDEX_NAME.to_string(),
            tag: ("test1".to_string(), "value1".to_string()),
        }
    }
}

impl KnowledgeBaseParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    pub fn with_collection_arn(mut self, collection_arn: impl Into<String>) -> Self {
        self.collection_arn = Some(collection_arn.into());
        self
    }

    pub fn replacements(&self) -> Replacements {
        let mut replacements = Replacements::new();
        replacements.insert("KNOWLEDGE_BASE_NAME".into(), self.name.clone());
        replacements.insert("KNOWLEDGE_BASE_DESCRIPTION".into(), self.description.clone());
        if let Some(role_arn) = &self.role_arn {
            replacements.insert("KNOWLEDGE_BASE_ROLE_ARN".into(), role_arn.clone());
        }
        replacements.insert("EMBEDDING_MODEL_ARN".into(), self.embedding_model_arn.clone());
        if let Some(collection_arn) = &self.collection_arn {
            replacements.insert("OPENSEARCH_COLLECTION_ARN".into(), collection_arn.clone());
        }
        replacements.insert("VECTOR_INDEX_NAME".into(), self.vector_index_name.clone());
        replacements.insert("TAG_KEY_1".into(), self.tag.0.clone());
        replacements.insert("TAG_VALUE_1".into(), self.tag.1.clone());
        replacements
    }
}

pub fn fixture(harness: &Harness, params: &KnowledgeBaseParams) -> LifecycleFixture {
    harness.fixture(KNOWLEDGE_BASE, params.replacements())
}

pub async fn crud(scenario: Scenario) -> Result<()> {
    scenario.wait_synced().await?;

    let description = json!(DEFAULT_DESCRIPTION);
    scenario.assert_spec_field("description", &description).await?;
    scenario.assert_remote_field("description", &description).await?;

    info!(id = scenario.id(), "updating knowledge base description");
    scenario
        .patch_spec(json!({ "description": UPDATED_DESCRIPTION }))
        .await?;
    scenario.settle().await;

    scenario
        .assert_remote_field("description", &json!(UPDATED_DESCRIPTION))
        .await
}

/// A partial tag update overwrites one value and adds two keys; the remote
/// tags must end up exactly equal to the patched map.
pub async fn tags(scenario: Scenario) -> Result<()> {
    scenario.wait_synced().await?;

    let initial = tag_set(&[("test1", "value1")]);
    scenario.assert_spec_tags(&initial).await?;
    scenario.assert_remote_tags(&initial).await?;

    let updated = tag_set(&[("test1", "newValue1"), ("test2", "value2"), ("test3", "value3")]);
    info!(id = scenario.id(), ?updated, "updating knowledge base tags");
    scenario.patch_spec(json!({ "tags": updated })).await?;
    scenario.settle().await;

    scenario.assert_remote_tags(&updated).await
}

fn tag_set(pairs: &[(&str, &str)]) -> TagSet {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
