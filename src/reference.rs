//! Addressing custom resources in the cluster
//!
//! A [`CustomResourceReference`] names one object by group, version, plural,
//! name and namespace. [`random_suffix_name`] produces unique resource names.

use crate::kind::ResourceKind;
use crate::{Error, Result};
use kube::api::ApiResource;
use rand::Rng;
use serde_json::Value;
use std::fmt;

const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Handle identifying a custom resource in the cluster.
///
/// Immutable once constructed; every cluster operation takes one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomResourceReference {
    group: String,
    version: String,
    plural: String,
    name: String,
    namespace: String,
}

impl CustomResourceReference {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        plural: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn for_kind(
        kind: &ResourceKind,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::new(kind.group, kind.version, kind.plural(), name, namespace)
    }

    /// Build a reference from a manifest's `apiVersion` and `metadata`.
    ///
    /// The plural cannot be recovered from a manifest, so the caller supplies it.
    pub fn from_manifest(manifest: &Value, plural: &str, default_namespace: &str) -> Result<Self> {
        let api_version = manifest
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidReference("missing apiVersion".to_string()))?;

        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };

        let metadata = manifest
            .get("metadata")
            .ok_or_else(|| Error::InvalidReference("missing metadata".to_string()))?;
        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidReference("missing metadata.name".to_string()))?;
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or(default_namespace);

        Ok(Self::new(group, version, plural, name, namespace))
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Dynamic API resource used to address the object through `kube::Api`.
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: String::new(),
            plural: self.plural.clone(),
        }
    }
}

impl fmt::Display for CustomResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}/{} {}/{}",
            self.plural, self.group, self.version, self.namespace, self.name
        )
    }
}

/// Returns `prefix` followed by a random lowercase suffix, filling up to
/// `max_len` characters.
pub fn random_suffix_name(prefix: &str, max_len: usize) -> String {
    let prefix_len = prefix.chars().count();
    if prefix_len + 1 >= max_len {
        return prefix.chars().take(max_len).collect();
    }

    let suffix_len = max_len - prefix_len - 1;
    let mut rng = rand::rng();
    let suffix: String = (0..suffix_len)
        .map(|_| NAME_CHARSET[rng.random_range(0..NAME_CHARSET.len())] as char)
        .collect();

    format!("{prefix}-{suffix}")
}
