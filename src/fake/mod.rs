//! In-process cluster and control plane for running the scenarios offline
//!
//! A [`FakeEnvironment`] pairs a `kube::Client` served by an in-memory API
//! server with an [`InMemoryControlPlane`], and a simulated controller that
//! reconciles one into the other with configurable lag.
//!
//! ```rust,no_run
//! use bedrockagent_e2e::fake::FakeEnvironmentBuilder;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> bedrockagent_e2e::Result<()> {
//! let env = FakeEnvironmentBuilder::new()
//!     .with_propagation_delay(Duration::from_secs(30))
//!     .build()
//!     .await?;
//! let cluster = env.cluster();
//! # Ok(())
//! # }
//! ```

mod api_server;
mod control_plane;
mod controller;
mod tracker;

#[cfg(test)]
mod controller_test;

pub use control_plane::InMemoryControlPlane;
pub use controller::ControllerSettings;
pub use tracker::{ObjectKey, ObjectTracker, GVR};

use crate::cluster::Cluster;
use crate::kind::{ResourceKind, AGENT, KNOWLEDGE_BASE};
use crate::remote::ControlPlane;
use crate::Result;
use api_server::FakeApiServer;
use controller::SimulatedController;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating fake environments
pub struct FakeEnvironmentBuilder {
    kinds: Vec<ResourceKind>,
    settings: ControllerSettings,
    namespace: String,
    finalizer: Option<String>,
}

impl FakeEnvironmentBuilder {
    /// Environment serving the agent and knowledge base kinds
    pub fn new() -> Self {
        Self {
            kinds: vec![AGENT, KNOWLEDGE_BASE],
            settings: ControllerSettings::default(),
            namespace: "default".to_string(),
            finalizer: None,
        }
    }

    /// Reconcile an additional kind
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn with_reconcile_delay(mut self, delay: Duration) -> Self {
        self.settings.reconcile_delay = delay;
        self
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.settings.propagation_delay = delay;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.settings.region = region.into();
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.settings.account_id = account_id.into();
        self
    }

    /// Default namespace of the returned client
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Leave custom resources unreconciled, as if the controller were not running
    pub fn without_controller(mut self) -> Self {
        self.settings.enabled = false;
        self
    }

    /// Reconcile without publishing the ARN in `status.ackResourceMetadata`
    pub fn without_status_arn(mut self) -> Self {
        self.settings.omit_status_arn = true;
        self
    }

    /// Add a finalizer to every created object that nothing ever removes, so
    /// deletes are accepted but never complete
    pub fn with_finalizer(mut self, finalizer: impl Into<String>) -> Self {
        self.finalizer = Some(finalizer.into());
        self
    }

    /// Build the environment. Must be called inside a tokio runtime.
    pub async fn build(self) -> Result<FakeEnvironment> {
        let tracker = match self.finalizer {
            Some(finalizer) => ObjectTracker::with_finalizer(finalizer),
            None => ObjectTracker::new(),
        };
        let control_plane = Arc::new(InMemoryControlPlane::new());
        let controller = Arc::new(SimulatedController::new(
            tracker.clone(),
            control_plane.clone(),
            self.kinds,
            self.settings,
        ));

        let service = FakeApiServer::new(tracker.clone(), controller);
        let client = kube::Client::new(service, self.namespace);

        Ok(FakeEnvironment {
            client,
            control_plane,
            tracker,
        })
    }
}

impl Default for FakeEnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running fake cluster plus the control plane its controller writes to
#[derive(Clone)]
pub struct FakeEnvironment {
    client: kube::Client,
    control_plane: Arc<InMemoryControlPlane>,
    tracker: ObjectTracker,
}

impl FakeEnvironment {
    pub fn client(&self) -> kube::Client {
        self.client.clone()
    }

    pub fn cluster(&self) -> Cluster {
        Cluster::new(self.client.clone())
    }

    /// The concrete control plane, for scheduling state and injecting failures
    pub fn control_plane(&self) -> Arc<InMemoryControlPlane> {
        self.control_plane.clone()
    }

    /// The control plane as the harness consumes it
    pub fn remote(&self) -> Arc<dyn ControlPlane> {
        self.control_plane.clone()
    }

    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }
}
