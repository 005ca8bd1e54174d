//! Assertions a test body makes against a provisioned resource

use crate::cluster::Cluster;
use crate::config::HarnessConfig;
use crate::fixture::ProvisionedResource;
use crate::kind::RESOURCE_SYNCED;
use crate::reference::CustomResourceReference;
use crate::remote::{Record, RemoteStateAccessor};
use crate::tags::{equal_tags, tags_from_value, TagSet};
use crate::{Error, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

/// View over one provisioned resource from both sides: the custom resource in
/// the cluster and the record on the remote control plane.
///
/// Every failed check is an [`Error::Assertion`].
#[derive(Clone)]
pub struct Scenario {
    cluster: Cluster,
    accessor: RemoteStateAccessor,
    config: HarnessConfig,
    resource: ProvisionedResource,
}

impl Scenario {
    pub fn new(
        cluster: Cluster,
        accessor: RemoteStateAccessor,
        config: HarnessConfig,
        resource: ProvisionedResource,
    ) -> Self {
        Self {
            cluster,
            accessor,
            config,
            resource,
        }
    }

    pub fn resource(&self) -> &ProvisionedResource {
        &self.resource
    }

    pub fn reference(&self) -> &CustomResourceReference {
        &self.resource.reference
    }

    pub fn id(&self) -> &str {
        &self.resource.id
    }

    pub fn arn(&self) -> Result<&str> {
        self.resource
            .arn
            .as_deref()
            .ok_or_else(|| Error::Assertion(format!("{} has no ARN", self.resource.reference)))
    }

    /// Wait for `ACK.ResourceSynced` to report `True`.
    pub async fn wait_synced(&self) -> Result<()> {
        let synced = self
            .cluster
            .wait_on_condition(self.reference(), RESOURCE_SYNCED, "True", self.config.sync_wait)
            .await?;
        if !synced {
            return Err(Error::Assertion(format!(
                "{} did not report {}=True within {} checks",
                self.reference(),
                RESOURCE_SYNCED,
                self.config.sync_wait.periods
            )));
        }
        info!(reference = %self.reference(), "resource synced");
        Ok(())
    }

    /// The custom resource as currently stored in the cluster
    pub async fn current(&self) -> Result<Value> {
        self.cluster
            .get(self.reference())
            .await?
            .ok_or_else(|| Error::Assertion(format!("{} not found in cluster", self.reference())))
    }

    pub async fn assert_spec_field(&self, field: &str, expected: &Value) -> Result<()> {
        let current = self.current().await?;
        let spec = current
            .get("spec")
            .ok_or_else(|| Error::Assertion(format!("{} has no spec", self.reference())))?;
        check_field("spec", spec.get(field), field, expected)
    }

    /// The remote record, which must exist
    pub async fn remote(&self) -> Result<Record> {
        self.accessor.get(self.id()).await?.ok_or_else(|| {
            Error::Assertion(format!(
                "{} {} not found in {} API",
                self.accessor.kind(),
                self.id(),
                self.accessor.kind().get_operation()
            ))
        })
    }

    pub async fn assert_remote_field(&self, field: &str, expected: &Value) -> Result<()> {
        let record = self.remote().await?;
        check_field("remote record", record.get(field), field, expected)
    }

    /// Merge `patch` into the custom resource's spec.
    pub async fn patch_spec(&self, patch: Value) -> Result<Value> {
        debug!(reference = %self.reference(), %patch, "patching spec");
        self.cluster
            .patch(self.reference(), &json!({ "spec": patch }))
            .await
    }

    /// Fixed wait for a spec change to reach the remote control plane.
    pub async fn settle(&self) {
        debug!(duration = ?self.config.modify_settle, "waiting for changes to settle");
        tokio::time::sleep(self.config.modify_settle).await;
    }

    /// Tags the remote control plane reports for this resource's ARN
    pub async fn remote_tags(&self) -> Result<TagSet> {
        let arn = self.arn()?;
        self.accessor
            .get_tags(arn)
            .await?
            .ok_or_else(|| Error::Assertion(format!("no tags found for {}", arn)))
    }

    /// The remote tags must equal `expected` exactly: no stale or missing keys.
    pub async fn assert_remote_tags(&self, expected: &TagSet) -> Result<()> {
        let actual = self.remote_tags().await?;
        if !equal_tags(&actual, expected) {
            return Err(Error::Assertion(format!(
                "remote tags {:?} differ from expected {:?}",
                actual, expected
            )));
        }
        Ok(())
    }

    pub async fn assert_spec_tags(&self, expected: &TagSet) -> Result<()> {
        let current = self.current().await?;
        let actual = current
            .pointer("/spec/tags")
            .and_then(tags_from_value)
            .ok_or_else(|| Error::Assertion(format!("{} has no spec.tags", self.reference())))?;
        if &actual != expected {
            return Err(Error::Assertion(format!(
                "spec.tags {:?} differ from expected {:?}",
                actual, expected
            )));
        }
        Ok(())
    }
}

fn check_field(source: &str, actual: Option<&Value>, field: &str, expected: &Value) -> Result<()> {
    match actual {
        None => Err(Error::Assertion(format!("{} has no field {:?}", source, field))),
        Some(actual) if actual != expected => Err(Error::Assertion(format!(
            "{}.{} is {}, expected {}",
            source, field, actual, expected
        ))),
        Some(_) => Ok(()),
    }
}
