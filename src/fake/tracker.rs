//! In-memory object storage backing the fake API server

use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GVR {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GVR {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

/// Fully qualified location of one stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub gvr: GVR,
    pub namespace: String,
    pub name: String,
}

type ObjectsByName = HashMap<String, Value>;
type ObjectsByNamespace = HashMap<String, ObjectsByName>;
type ObjectStorage = HashMap<GVR, ObjectsByNamespace>;

/// Stores custom resources with status-subresource semantics: writes to the
/// main resource never touch `status`, status writes never touch anything else.
#[derive(Clone, Default)]
pub struct ObjectTracker {
    objects: Arc<RwLock<ObjectStorage>>,
    finalizer: Option<String>,
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that adds `finalizer` to every created object. Nothing removes
    /// it, so deleted objects only gain a `deletionTimestamp`.
    pub fn with_finalizer(finalizer: impl Into<String>) -> Self {
        Self {
            finalizer: Some(finalizer.into()),
            ..Self::default()
        }
    }

    pub fn create(&self, gvr: &GVR, mut object: Value, namespace: &str) -> Result<Value> {
        trace!("Creating object: {:?} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = meta
            .name
            .clone()
            .ok_or_else(|| Error::InvalidReference("object name is required".to_string()))?;

        if meta
            .resource_version
            .as_ref()
            .is_some_and(|rv| !rv.is_empty())
        {
            return Err(Error::InvalidReference(
                "resourceVersion can not be set for Create requests".to_string(),
            ));
        }

        let mut objects = self.write()?;
        let ns_objects = objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default();

        if ns_objects.contains_key(&name) {
            return Err(already_exists(gvr, namespace, &name));
        }

        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some("1".to_string());
        meta.generation = Some(1);
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.creation_timestamp = Some(Time(chrono::Utc::now()));
        meta.deletion_timestamp = None;
        if let Some(finalizer) = &self.finalizer {
            let finalizers = meta.finalizers.get_or_insert_with(Vec::new);
            if !finalizers.contains(finalizer) {
                finalizers.push(finalizer.clone());
            }
        }

        object["metadata"] = serde_json::to_value(&meta)?;
        if let Some(fields) = object.as_object_mut() {
            fields.remove("status");
        }

        ns_objects.insert(name.clone(), object.clone());

        debug!("Created object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Getting object: {:?} {}/{}", gvr, namespace, name);

        self.read()?
            .get(gvr)
            .and_then(|by_ns| by_ns.get(namespace))
            .and_then(|by_name| by_name.get(name))
            .cloned()
            .ok_or_else(|| not_found(gvr, namespace, name))
    }

    /// Replace everything but `status`, bumping `generation` when `spec` changed.
    pub fn update(&self, gvr: &GVR, namespace: &str, name: &str, mut object: Value) -> Result<Value> {
        trace!("Updating object: {:?} {}/{}", gvr, namespace, name);

        let mut objects = self.write()?;
        let existing = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .and_then(|by_name| by_name.get_mut(name))
            .ok_or_else(|| not_found(gvr, namespace, name))?;

        let existing_meta = extract_metadata(existing)?;
        let mut meta = extract_metadata(&object)?;

        meta.name = existing_meta.name.clone();
        meta.namespace = existing_meta.namespace.clone();
        meta.uid = existing_meta.uid.clone();
        meta.creation_timestamp = existing_meta.creation_timestamp.clone();
        meta.deletion_timestamp = existing_meta.deletion_timestamp.clone();
        meta.resource_version = Some(increment_resource_version(
            existing_meta.resource_version.as_deref().unwrap_or(""),
        )?);

        let generation = existing_meta.generation.unwrap_or(1);
        meta.generation = Some(if existing.get("spec") != object.get("spec") {
            generation + 1
        } else {
            generation
        });

        object["metadata"] = serde_json::to_value(&meta)?;
        match existing.get("status") {
            Some(status) => object["status"] = status.clone(),
            None => {
                if let Some(fields) = object.as_object_mut() {
                    fields.remove("status");
                }
            }
        }

        *existing = object.clone();

        debug!("Updated object: {}/{}", namespace, name);
        Ok(object)
    }

    /// Replace only `status`.
    pub fn update_status(&self, gvr: &GVR, namespace: &str, name: &str, status: Value) -> Result<Value> {
        trace!("Updating status: {:?} {}/{}", gvr, namespace, name);

        let mut objects = self.write()?;
        let existing = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .and_then(|by_name| by_name.get_mut(name))
            .ok_or_else(|| not_found(gvr, namespace, name))?;

        let mut meta = extract_metadata(existing)?;
        meta.resource_version = Some(increment_resource_version(
            meta.resource_version.as_deref().unwrap_or(""),
        )?);

        existing["metadata"] = serde_json::to_value(&meta)?;
        existing["status"] = status;

        debug!("Updated status: {}/{}", namespace, name);
        Ok(existing.clone())
    }

    /// Remove the object, or only mark it with a `deletionTimestamp` while it
    /// still carries finalizers. Either way the returned object is its last state.
    pub fn delete(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Deleting object: {:?} {}/{}", gvr, namespace, name);

        let mut objects = self.write()?;
        let by_name = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        let existing = by_name
            .get_mut(name)
            .ok_or_else(|| not_found(gvr, namespace, name))?;

        let mut meta = extract_metadata(existing)?;
        if meta.finalizers.as_ref().is_some_and(|f| !f.is_empty()) {
            if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Time(chrono::Utc::now()));
                meta.resource_version = Some(increment_resource_version(
                    meta.resource_version.as_deref().unwrap_or(""),
                )?);
                existing["metadata"] = serde_json::to_value(&meta)?;
            }
            debug!("Object {}/{} has finalizers, marked for deletion", namespace, name);
            return Ok(existing.clone());
        }

        let stored = by_name
            .remove(name)
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        debug!("Deleted object: {}/{}", namespace, name);
        Ok(stored)
    }

    pub fn list(&self, gvr: &GVR, namespace: &str) -> Result<Vec<Value>> {
        trace!("Listing objects: {:?} in namespace: {}", gvr, namespace);

        Ok(self
            .read()?
            .get(gvr)
            .and_then(|by_ns| by_ns.get(namespace))
            .map(|by_name| by_name.values().cloned().collect())
            .unwrap_or_default())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, ObjectStorage>> {
        self.objects
            .read()
            .map_err(|_| Error::Internal("object tracker lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, ObjectStorage>> {
        self.objects
            .write()
            .map_err(|_| Error::Internal("object tracker lock poisoned".to_string()))
    }
}

/// Error a tracker lookup returns for a missing object; the API server maps it to 404.
pub fn not_found(gvr: &GVR, namespace: &str, name: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{}.{} \"{}\" not found in namespace {}", gvr.resource, gvr.group, name, namespace),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

fn already_exists(gvr: &GVR, namespace: &str, name: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: format!(
            "{}.{} \"{}\" already exists in namespace {}",
            gvr.resource, gvr.group, name, namespace
        ),
        reason: "AlreadyExists".to_string(),
        code: 409,
    }))
}

pub fn increment_resource_version(current: &str) -> Result<String> {
    match current {
        "" => Ok("1".to_string()),
        v => {
            let num: u64 = v
                .parse()
                .map_err(|_| Error::Internal(format!("Invalid resource version: {}", v)))?;
            Ok((num + 1).to_string())
        }
    }
}

pub fn extract_metadata(object: &Value) -> Result<ObjectMeta> {
    let meta_value = object
        .get("metadata")
        .ok_or_else(|| Error::InvalidReference("object missing metadata field".to_string()))?;

    Ok(serde_json::from_value(meta_value.clone())?)
}
