//! Scoped provisioning of one custom resource
//!
//! A [`LifecycleFixture`] walks a resource through
//! `not created → created → acked by the controller → present remotely`,
//! hands it to a test body, and then walks it back through
//! `delete requested → absent remotely`. Teardown runs whatever the body does,
//! including panicking.

use crate::cluster::Cluster;
use crate::config::HarnessConfig;
use crate::kind::ResourceKind;
use crate::loader::{Replacements, ResourceLoader};
use crate::reference::CustomResourceReference;
use crate::remote::RemoteStateAccessor;
use crate::scenario::Scenario;
use crate::waiter::ConvergenceWaiter;
use crate::{Error, Result};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixturePhase {
    NotCreated,
    Created,
    ControllerAcked,
    RemoteConverged,
    DeleteRequested,
    RemoteAbsent,
}

impl fmt::Display for FixturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixturePhase::NotCreated => "not-created",
            FixturePhase::Created => "created",
            FixturePhase::ControllerAcked => "controller-acked",
            FixturePhase::RemoteConverged => "remote-converged",
            FixturePhase::DeleteRequested => "delete-requested",
            FixturePhase::RemoteAbsent => "remote-absent",
        };
        f.write_str(name)
    }
}

/// A custom resource the controller has reconciled and the remote control
/// plane reports as existing.
#[derive(Debug, Clone)]
pub struct ProvisionedResource {
    pub reference: CustomResourceReference,
    /// The record as first populated by the controller
    pub record: Value,
    /// Provider-assigned identifier from `status.<id field>`
    pub id: String,
    /// `status.ackResourceMetadata.arn`, when the controller published one
    pub arn: Option<String>,
}

pub struct LifecycleFixture {
    cluster: Cluster,
    accessor: RemoteStateAccessor,
    waiter: ConvergenceWaiter,
    kind: ResourceKind,
    loader: ResourceLoader,
    replacements: Replacements,
    config: HarnessConfig,
    phase: FixturePhase,
}

impl LifecycleFixture {
    pub fn new(
        cluster: Cluster,
        accessor: RemoteStateAccessor,
        kind: ResourceKind,
        loader: ResourceLoader,
        replacements: Replacements,
        config: HarnessConfig,
    ) -> Self {
        let waiter = ConvergenceWaiter::new(accessor.clone(), config.exists_wait, config.deleted_wait);

        Self {
            cluster,
            accessor,
            waiter,
            kind,
            loader,
            replacements,
            config,
            phase: FixturePhase::NotCreated,
        }
    }

    pub fn phase(&self) -> FixturePhase {
        self.phase
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    fn transition(&mut self, phase: FixturePhase, reference: &CustomResourceReference) {
        info!(kind = self.kind.kind, %reference, from = %self.phase, to = %phase, "fixture phase");
        self.phase = phase;
    }

    /// Create the resource and block until the remote control plane reports it.
    ///
    /// If anything fails after the create call was accepted, the resource is
    /// deleted again on a best-effort basis before the error is returned.
    pub async fn setup(&mut self) -> Result<ProvisionedResource> {
        let manifest = self.loader.load_resource(self.kind.template, &self.replacements)?;
        let reference =
            CustomResourceReference::from_manifest(&manifest, &self.kind.plural(), &self.config.namespace)?;

        info!(kind = self.kind.kind, name = reference.name(), "creating custom resource");
        self.cluster.create(&reference, &manifest).await?;
        self.transition(FixturePhase::Created, &reference);

        match self.await_provisioned(reference.clone()).await {
            Ok(resource) => Ok(resource),
            Err(err) => {
                warn!(%reference, error = %err, "setup failed, deleting partially created resource");
                if let Err(cleanup) = self.cluster.delete(&reference, self.config.delete_wait).await {
                    error!(%reference, error = %cleanup, "failed to delete partially created resource");
                }
                Err(err)
            }
        }
    }

    async fn await_provisioned(&mut self, reference: CustomResourceReference) -> Result<ProvisionedResource> {
        let record = self
            .cluster
            .wait_resource_consumed_by_controller(&reference, self.config.consumed_wait)
            .await?
            .ok_or_else(|| {
                Error::SetupAssertion(format!("{} was never consumed by the controller", reference))
            })?;

        if !self.cluster.exists(&reference).await? {
            return Err(Error::SetupAssertion(format!("{} does not exist", reference)));
        }
        self.transition(FixturePhase::ControllerAcked, &reference);

        let status = record
            .get("status")
            .and_then(Value::as_object)
            .filter(|status| !status.is_empty())
            .ok_or_else(|| Error::SetupAssertion(format!("{} has no status", reference)))?;

        let id = status
            .get(self.kind.id_field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::SetupAssertion(format!("status.{} missing on {}", self.kind.id_field, reference))
            })?
            .to_string();

        let arn = status
            .get("ackResourceMetadata")
            .and_then(|metadata| metadata.get("arn"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if self.kind.requires_arn && arn.is_none() {
            return Err(Error::SetupAssertion(format!(
                "status.ackResourceMetadata.arn missing on {}",
                reference
            )));
        }

        self.waiter.wait_until_exists(&id).await?;
        self.transition(FixturePhase::RemoteConverged, &reference);

        Ok(ProvisionedResource {
            reference,
            record,
            id,
            arn,
        })
    }

    /// Delete the resource and block until the remote control plane no
    /// longer reports it.
    pub async fn teardown(&mut self, resource: &ProvisionedResource) -> Result<()> {
        self.transition(FixturePhase::DeleteRequested, &resource.reference);

        let (_, deleted) = self
            .cluster
            .delete(&resource.reference, self.config.delete_wait)
            .await?;
        if !deleted {
            return Err(Error::TeardownAssertion(format!(
                "{} still present after {} delete checks",
                resource.reference, self.config.delete_wait.periods
            )));
        }

        self.waiter.wait_until_deleted(&resource.id).await?;
        self.transition(FixturePhase::RemoteAbsent, &resource.reference);
        Ok(())
    }

    pub fn scenario(&self, resource: &ProvisionedResource) -> Scenario {
        Scenario::new(
            self.cluster.clone(),
            self.accessor.clone(),
            self.config.clone(),
            resource.clone(),
        )
    }

    /// Set up, run `body` against the provisioned resource, and tear down.
    ///
    /// The body is not run if setup fails. Teardown always runs once setup
    /// succeeded. When both the body and teardown fail the result is
    /// [`Error::BodyAndTeardown`]; a panicking body is resumed after teardown,
    /// with the teardown error appended to its message if there was one.
    pub async fn run<F, Fut, T>(mut self, body: F) -> Result<T>
    where
        F: FnOnce(Scenario) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let resource = self.setup().await?;
        let scenario = self.scenario(&resource);
        let outcome = AssertUnwindSafe(async move { body(scenario).await })
            .catch_unwind()
            .await;
        let teardown = self.teardown(&resource).await;

        match (outcome, teardown) {
            (Ok(Ok(value)), teardown) => teardown.map(|()| value),
            (Ok(Err(err)), Ok(())) => Err(err),
            (Ok(Err(err)), Err(teardown_err)) => {
                error!(reference = %resource.reference, error = %teardown_err, "teardown failed after failed test body");
                Err(Error::BodyAndTeardown {
                    body: Box::new(err),
                    teardown: Box::new(teardown_err),
                })
            }
            (Err(panic), Ok(())) => std::panic::resume_unwind(panic),
            (Err(panic), Err(teardown_err)) => {
                error!(reference = %resource.reference, error = %teardown_err, "teardown failed after panicking test body");
                panic!("{}; teardown also failed: {}", panic_message(&*panic), teardown_err)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("test body panicked")
}
