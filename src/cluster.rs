//! Custom resource operations against the cluster API
//!
//! Thin wrapper over `kube::Api<DynamicObject>`: the harness works with
//! untyped records, so every call goes through the dynamic API built from a
//! [`CustomResourceReference`].

use crate::config::PeriodicWait;
use crate::reference::CustomResourceReference;
use crate::Result;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use serde_json::Value;
use tracing::{debug, info};

/// Handle on the cluster's custom resource API
#[derive(Clone)]
pub struct Cluster {
    client: kube::Client,
}

impl Cluster {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster configuration
    pub async fn try_default() -> Result<Self> {
        Ok(Self::new(kube::Client::try_default().await?))
    }

    pub fn client(&self) -> &kube::Client {
        &self.client
    }

    fn api(&self, reference: &CustomResourceReference) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            reference.namespace(),
            &reference.api_resource(),
        )
    }

    pub async fn create(&self, reference: &CustomResourceReference, manifest: &Value) -> Result<Value> {
        let object: DynamicObject = serde_json::from_value(manifest.clone())?;
        let created = self
            .api(reference)
            .create(&PostParams::default(), &object)
            .await?;
        info!(%reference, "created custom resource");
        Ok(serde_json::to_value(created)?)
    }

    /// Returns the current record, or `None` if the object does not exist.
    pub async fn get(&self, reference: &CustomResourceReference) -> Result<Option<Value>> {
        let object = self.api(reference).get_opt(reference.name()).await?;
        object
            .map(serde_json::to_value)
            .transpose()
            .map_err(Into::into)
    }

    pub async fn exists(&self, reference: &CustomResourceReference) -> Result<bool> {
        Ok(self.get(reference).await?.is_some())
    }

    /// Apply a JSON merge patch, e.g. `{"spec": {"description": "..."}}`.
    pub async fn patch(&self, reference: &CustomResourceReference, patch: &Value) -> Result<Value> {
        let patched = self
            .api(reference)
            .patch(reference.name(), &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        info!(%reference, "patched custom resource");
        Ok(serde_json::to_value(patched)?)
    }

    /// Delete the object and check up to `wait.periods` times, `wait.period_length`
    /// apart, that it is gone.
    ///
    /// Returns the API server's response object (if any) and whether the object
    /// was observed gone.
    pub async fn delete(
        &self,
        reference: &CustomResourceReference,
        wait: PeriodicWait,
    ) -> Result<(Option<Value>, bool)> {
        let response = match self
            .api(reference)
            .delete(reference.name(), &DeleteParams::default())
            .await
        {
            Ok(response) => response.left().map(serde_json::to_value).transpose()?,
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!(%reference, "custom resource already gone");
                None
            }
            Err(err) => return Err(err.into()),
        };
        info!(%reference, "deleted custom resource");

        for period in 0..wait.periods {
            if !self.exists(reference).await? {
                return Ok((response, true));
            }
            debug!(%reference, period, "custom resource still present");
            tokio::time::sleep(wait.period_length).await;
        }

        Ok((response, !self.exists(reference).await?))
    }

    /// Wait for the controller to write a non-empty `status`.
    ///
    /// Returns the record once `status` is populated, `None` if it never was.
    pub async fn wait_resource_consumed_by_controller(
        &self,
        reference: &CustomResourceReference,
        wait: PeriodicWait,
    ) -> Result<Option<Value>> {
        for period in 0..wait.periods {
            if let Some(record) = self.get(reference).await? {
                if has_status(&record) {
                    debug!(%reference, period, "custom resource consumed by controller");
                    return Ok(Some(record));
                }
            }
            if period + 1 < wait.periods {
                tokio::time::sleep(wait.period_length).await;
            }
        }
        Ok(None)
    }

    /// Wait for condition `condition_type` to report `expected` in `status.conditions`.
    pub async fn wait_on_condition(
        &self,
        reference: &CustomResourceReference,
        condition_type: &str,
        expected: &str,
        wait: PeriodicWait,
    ) -> Result<bool> {
        for period in 0..wait.periods {
            let current = self.get(reference).await?;
            let status = current
                .as_ref()
                .and_then(|record| condition_status(record, condition_type));

            if status == Some(expected) {
                debug!(%reference, condition_type, expected, "condition reached");
                return Ok(true);
            }
            debug!(%reference, condition_type, ?status, period, "condition not reached");
            if period + 1 < wait.periods {
                tokio::time::sleep(wait.period_length).await;
            }
        }
        Ok(false)
    }
}

fn has_status(record: &Value) -> bool {
    record
        .get("status")
        .and_then(Value::as_object)
        .is_some_and(|status| !status.is_empty())
}

/// Status of the condition of the given type in `status.conditions`
pub fn condition_status<'a>(record: &'a Value, condition_type: &str) -> Option<&'a str> {
    record
        .get("status")?
        .get("conditions")?
        .as_array()?
        .iter()
        .find(|condition| condition.get("type").and_then(Value::as_str) == Some(condition_type))?
        .get("status")?
        .as_str()
}
