//! Agent fixture parameters and the Agent CRUD scenario

use crate::fixture::LifecycleFixture;
use crate::harness::Harness;
use crate::kind::AGENT;
use crate::loader::Replacements;
use crate::reference::random_suffix_name;
use crate::scenario::Scenario;
use crate::Result;
use serde_json::json;
use tracing::info;

pub const DEFAULT_DESCRIPTION: &str = "Test agent for e2e testing";
pub const UPDATED_DESCRIPTION: &str = "Updated test agent description";
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant";
pub const DEFAULT_MODEL: &str =
    "arn:aws:bedrock:us-east-2:807147659905:inference-profile/us.amazon.nova-lite-v1:0";

/// Values substituted into the `agent` manifest template.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentParams {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model: String,
    /// Falls back to the loader's base `AGENT_ROLE_ARN` replacement when unset
    pub role_arn: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_length: u32,
    pub tag: (String, String),
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            name: random_suffix_name("bedrock-test-agent", 32),
            description: DEFAULT_DESCRIPTION.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            role_arn: None,
            temperature: 0.7,
            top_p: 0.9,
            max_length: 2048,
            tag: ("test1".to_string(), "value1".to_string()),
        }
    }
}

impl AgentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn replacements(&self) -> Replacements {
        let mut replacements = Replacements::new();
        replacements.insert("AGENT_NAME".into(), self.name.clone());
        replacements.insert("AGENT_DESCRIPTION".into(), self.description.clone());
        replacements.insert("AGENT_INSTRUCTION".into(), self.instruction.clone());
        replacements.insert("AGENT_MODEL".into(), self.model.clone());
        if let Some(role_arn) = &self.role_arn {
            replacements.insert("AGENT_ROLE_ARN".into(), role_arn.clone());
        }
        replacements.insert("AGENT_PROMPT_TEMP".into(), self.temperature.to_string());
        replacements.insert("AGENT_TOP_P".into(), self.top_p.to_string());
        replacements.insert("AGENT_MAX_LENGTH".into(), self.max_length.to_string());
        replacements.insert("TAG_KEY_1".into(), self.tag.0.clone());
        replacements.insert("TAG_VALUE_1".into(), self.tag.1.clone());
        replacements
    }
}

pub fn fixture(harness: &Harness, params: &AgentParams) -> LifecycleFixture {
    harness.fixture(AGENT, params.replacements())
}

/// Initial description matches on both sides, and an updated description
/// reaches the remote agent.
pub async fn crud(scenario: Scenario) -> Result<()> {
    scenario.wait_synced().await?;

    let description = json!(DEFAULT_DESCRIPTION);
    scenario.assert_spec_field("description", &description).await?;
    scenario.assert_remote_field("description", &description).await?;

    info!(id = scenario.id(), "updating agent description");
    scenario
        .patch_spec(json!({ "description": UPDATED_DESCRIPTION }))
        .await?;
    scenario.settle().await;

    scenario
        .assert_remote_field("description", &json!(UPDATED_DESCRIPTION))
        .await
}
