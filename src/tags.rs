//! Tag set comparison shared by the tag assertions and the simulated controller

use serde_json::Value;
use std::collections::BTreeMap;

pub type TagSet = BTreeMap<String, String>;

/// Changes required to turn one tag set into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub added_or_updated: TagSet,
    /// Only the keys of removed tags
    pub removed: Vec<String>,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.added_or_updated.is_empty() && self.removed.is_empty()
    }

    pub fn apply(&self, tags: &mut TagSet) {
        for key in &self.removed {
            tags.remove(key);
        }
        for (key, value) in &self.added_or_updated {
            tags.insert(key.clone(), value.clone());
        }
    }
}

/// Compare the desired tags against the latest observed ones.
pub fn compute_tags_delta(desired: &TagSet, latest: &TagSet) -> TagDelta {
    let added_or_updated = desired
        .iter()
        .filter(|(key, value)| latest.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let removed = latest
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .cloned()
        .collect();

    TagDelta {
        added_or_updated,
        removed,
    }
}

pub fn equal_tags(a: &TagSet, b: &TagSet) -> bool {
    compute_tags_delta(a, b).is_empty()
}

/// Read a JSON object of string values as a tag set.
///
/// Returns `None` when the value is not an object or holds a non-string value.
pub fn tags_from_value(value: &Value) -> Option<TagSet> {
    value
        .as_object()?
        .iter()
        .map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
        .collect()
}
