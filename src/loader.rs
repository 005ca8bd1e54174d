//! Manifest templates for the custom resources under test
//!
//! Templates live in a directory as `<name>.yaml` and use `{{ KEY }}`
//! placeholders. A loader carries base replacements (account-wide values such
//! as role ARNs) that every render sees; callers overlay per-test values.

use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

/// Prefix of environment variables contributing base replacements
pub const REPLACEMENT_ENV_PREFIX: &str = "E2E_REPLACEMENT_";

pub type Replacements = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct ResourceLoader {
    resources_dir: PathBuf,
    replacements: Replacements,
}

impl ResourceLoader {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        Self {
            resources_dir: resources_dir.into(),
            replacements: Replacements::new(),
        }
    }

    /// Loader over the manifests shipped with this crate
    pub fn bundled() -> Self {
        Self::new(concat!(env!("CARGO_MANIFEST_DIR"), "/resources"))
    }

    /// Bundled manifests with base replacements taken from `E2E_REPLACEMENT_<KEY>`
    /// environment variables.
    pub fn from_env() -> Self {
        Self::bundled().with_replacements(replacements_from_env(std::env::vars()))
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }

    pub fn with_replacement(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.replacements.insert(key.into(), value.into());
        self
    }

    pub fn with_replacements(mut self, replacements: Replacements) -> Self {
        self.replacements.extend(replacements);
        self
    }

    /// Render `<name>.yaml` with the base replacements overlaid by
    /// `additional` and parse it into a manifest.
    pub fn load_resource(&self, name: &str, additional: &Replacements) -> Result<Value> {
        let path = self.resources_dir.join(format!("{name}.yaml"));
        let template = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        let mut context = Context::new();
        for (key, value) in self.replacements.iter().chain(additional.iter()) {
            context.insert(key.as_str(), value);
        }

        let rendered = Tera::one_off(&template, &context, false)?;
        debug!(?path, "rendered resource template");

        let manifest: Value = serde_yaml::from_str(&rendered)?;
        if !manifest.is_object() {
            return Err(Error::Internal(format!(
                "template {:?} did not render to a mapping",
                path
            )));
        }
        Ok(manifest)
    }
}

/// Collect `E2E_REPLACEMENT_<KEY>=<value>` pairs as `KEY => value`.
pub fn replacements_from_env<I>(vars: I) -> Replacements
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(REPLACEMENT_ENV_PREFIX)
                .filter(|stripped| !stripped.is_empty())
                .map(|stripped| (stripped.to_string(), value))
        })
        .collect()
}
