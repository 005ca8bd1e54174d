//! End-to-end convergence harness for the Bedrock Agent controller.
//!
//! The harness creates `Agent` and `KnowledgeBase` custom resources, waits for
//! the controller to reconcile them, and checks the remote control plane
//! directly until it agrees with the desired state. Mutations and deletions
//! are verified the same way.
//!
//! Live runs use the ambient cluster and a [`ControlPlane`] implementation
//! backed by the cloud API. The [`fake`] module provides both sides in memory.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bedrockagent_e2e::fake::FakeEnvironmentBuilder;
//! use bedrockagent_e2e::{agent, Harness, HarnessConfig, ResourceLoader};
//!
//! # #[tokio::main]
//! # async fn main() -> bedrockagent_e2e::Result<()> {
//! let env = FakeEnvironmentBuilder::new().build().await?;
//! let loader = ResourceLoader::bundled()
//!     .with_replacement("AGENT_ROLE_ARN", "arn:aws:iam::000000000000:role/agent");
//! let harness = Harness::new(env.cluster(), env.remote(), loader, HarnessConfig::default());
//!
//! agent::fixture(&harness, &agent::AgentParams::new())
//!     .run(agent::crud)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
mod cluster;
mod config;
mod error;
pub mod fake;
mod fixture;
mod harness;
pub mod kind;
pub mod knowledge_base;
mod loader;
mod reference;
pub mod remote;
mod scenario;
pub mod tags;
mod waiter;

#[cfg(test)]
mod cluster_test;
#[cfg(test)]
mod loader_test;
#[cfg(test)]
mod waiter_test;

pub use cluster::{condition_status, Cluster};
pub use config::{HarnessConfig, PeriodicWait, WaitPolicy};
pub use error::{Error, Result};
pub use fixture::{FixturePhase, LifecycleFixture, ProvisionedResource};
pub use harness::Harness;
pub use loader::{replacements_from_env, Replacements, ResourceLoader, REPLACEMENT_ENV_PREFIX};
pub use reference::{random_suffix_name, CustomResourceReference};
pub use remote::{ControlPlane, Record, RemoteError, RemoteStateAccessor};
pub use scenario::Scenario;
pub use waiter::{await_condition, ConvergenceWaiter};
