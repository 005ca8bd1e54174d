//! Simulated reconciler driving the in-memory control plane
//!
//! Stands in for the controller under test: it picks up custom resource
//! writes after a reconcile delay, mirrors the desired spec onto remote
//! records and tags, and reports back through `status` the way the real
//! controller does (provider id, `ackResourceMetadata`, `ACK.ResourceSynced`).
//!
//! Each reconcile is a task sleeping on the tokio clock, so tests running
//! with paused time see the controller make progress while they wait.

use crate::fake::control_plane::InMemoryControlPlane;
use crate::fake::tracker::{ObjectKey, ObjectTracker, GVR};
use crate::kind::{RemoteKind, ResourceKind, RESOURCE_SYNCED};
use crate::remote::Record;
use crate::tags::{compute_tags_delta, tags_from_value, TagSet};
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Whether the controller runs at all
    pub enabled: bool,
    /// Time between a write and the reconcile that handles it
    pub reconcile_delay: Duration,
    /// Time between a remote write and it becoming observable
    pub propagation_delay: Duration,
    pub region: String,
    pub account_id: String,
    /// Leave `ackResourceMetadata.arn` out of the status
    pub omit_status_arn: bool,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reconcile_delay: Duration::from_secs(2),
            propagation_delay: Duration::from_secs(20),
            region: "us-west-2".to_string(),
            account_id: "000000000000".to_string(),
            omit_status_arn: false,
        }
    }
}

pub struct SimulatedController {
    tracker: ObjectTracker,
    control_plane: Arc<InMemoryControlPlane>,
    kinds: HashMap<GVR, ResourceKind>,
    settings: ControllerSettings,
}

impl SimulatedController {
    pub fn new(
        tracker: ObjectTracker,
        control_plane: Arc<InMemoryControlPlane>,
        kinds: impl IntoIterator<Item = ResourceKind>,
        settings: ControllerSettings,
    ) -> Self {
        let kinds = kinds
            .into_iter()
            .map(|kind| (GVR::new(kind.group, kind.version, kind.plural()), kind))
            .collect();

        Self {
            tracker,
            control_plane,
            kinds,
            settings,
        }
    }

    pub fn manages(&self, gvr: &GVR) -> bool {
        self.kinds.contains_key(gvr)
    }

    /// A custom resource was created or its spec changed.
    ///
    /// Must be called inside a tokio runtime.
    pub fn observe_write(self: &Arc<Self>, key: &ObjectKey) -> Result<()> {
        if !self.settings.enabled || !self.manages(&key.gvr) {
            return Ok(());
        }

        let object = self.tracker.get(&key.gvr, &key.namespace, &key.name)?;
        if let Some(status) = object.get("status").filter(|s| s.is_object()) {
            let mut status = status.clone();
            set_synced(&mut status, false, "spec changed, reconcile pending");
            self.tracker
                .update_status(&key.gvr, &key.namespace, &key.name, status)?;
        }

        let controller = Arc::clone(self);
        let key = key.clone();
        let delay = self.settings.reconcile_delay;
        debug!(name = %key.name, ?delay, "queued reconcile");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = controller.reconcile(&key) {
                warn!(name = %key.name, error = %err, "simulated reconcile failed");
            }
        });
        Ok(())
    }

    /// A custom resource was removed from the cluster.
    pub fn observe_delete(&self, key: &ObjectKey, deleted: &Value) {
        if !self.settings.enabled {
            return;
        }
        let Some(kind) = self.kinds.get(&key.gvr) else {
            return;
        };

        let status = deleted.get("status");
        let id = status
            .and_then(|s| s.get(kind.id_field))
            .and_then(Value::as_str);
        let delay = self.settings.reconcile_delay + self.settings.propagation_delay;

        if let Some(id) = id {
            info!(kind = kind.kind, id, "deleting remote resource");
            self.control_plane.remove_record(kind.remote, id, delay);
            let arn = self.arn_for(kind.remote, id);
            self.control_plane.remove_tags(&arn, delay);
        }
    }

    fn reconcile(&self, key: &ObjectKey) -> Result<()> {
        let Some(kind) = self.kinds.get(&key.gvr) else {
            return Ok(());
        };
        let object = match self.tracker.get(&key.gvr, &key.namespace, &key.name) {
            Ok(object) => object,
            Err(_) => {
                debug!(name = %key.name, "object gone before reconcile");
                return Ok(());
            }
        };

        let spec = object.get("spec").cloned().unwrap_or_else(|| json!({}));
        let existing_id = object
            .get("status")
            .and_then(|s| s.get(kind.id_field))
            .and_then(Value::as_str)
            .map(str::to_string);

        let id = match existing_id {
            Some(id) => id,
            None => {
                let id = generate_id();
                info!(kind = kind.kind, name = %key.name, id = %id, "creating remote resource");
                id
            }
        };
        let arn = self.arn_for(kind.remote, &id);
        let delay = self.settings.propagation_delay;

        let record = build_record(kind.remote, &id, &arn, &spec);
        if self.control_plane.scheduled_record(kind.remote, &id).as_ref() != Some(&record) {
            self.control_plane.put_record(kind.remote, &id, record, delay);
        }

        let desired_tags = spec
            .get("tags")
            .and_then(tags_from_value)
            .unwrap_or_default();
        let mut latest_tags = self.control_plane.scheduled_tags(&arn);
        let delta = compute_tags_delta(&desired_tags, latest_tags.as_ref().unwrap_or(&TagSet::new()));
        if latest_tags.is_none() || !delta.is_empty() {
            debug!(arn = %arn, ?delta, "syncing tags");
            let tags = latest_tags.get_or_insert_with(TagSet::new);
            delta.apply(tags);
            self.control_plane.put_tags(&arn, tags.clone(), delay);
        }

        let mut status = json!({
            kind.id_field: id,
            "ackResourceMetadata": {
                "ownerAccountID": self.settings.account_id,
                "region": self.settings.region,
            },
        });
        if !self.settings.omit_status_arn {
            status["ackResourceMetadata"]["arn"] = json!(arn);
        }
        set_synced(&mut status, true, "");
        self.tracker
            .update_status(&key.gvr, &key.namespace, &key.name, status)?;

        Ok(())
    }

    fn arn_for(&self, kind: RemoteKind, id: &str) -> String {
        format!(
            "arn:aws:bedrock:{}:{}:{}/{}",
            self.settings.region,
            self.settings.account_id,
            kind.arn_resource_type(),
            id
        )
    }
}

/// Remote record mirroring the desired spec
fn build_record(kind: RemoteKind, id: &str, arn: &str, spec: &Value) -> Record {
    let mut record: Record = spec
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(key, _)| key.as_str() != "tags")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    record.insert(kind.id_key().to_string(), json!(id));
    record.insert(kind.arn_key().to_string(), json!(arn));
    let (status_key, status) = match kind {
        RemoteKind::Agent => ("agentStatus", "PREPARED"),
        RemoteKind::KnowledgeBase => ("status", "ACTIVE"),
    };
    record.insert(status_key.to_string(), json!(status));
    record
}

fn set_synced(status: &mut Value, synced: bool, message: &str) {
    let condition = json!({
        "type": RESOURCE_SYNCED,
        "status": if synced { "True" } else { "False" },
        "message": message,
        "lastTransitionTime": chrono::Utc::now().to_rfc3339(),
    });

    let conditions = status
        .as_object_mut()
        .map(|fields| fields.entry("conditions").or_insert_with(|| json!([])));

    if let Some(Value::Array(conditions)) = conditions {
        conditions.retain(|c| c.get("type").and_then(Value::as_str) != Some(RESOURCE_SYNCED));
        conditions.push(condition);
    }
}

/// Ten uppercase alphanumerics, the shape of Bedrock resource ids
fn generate_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .to_ascii_uppercase()
        .chars()
        .take(10)
        .collect()
}
