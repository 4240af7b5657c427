//! # Stage Diff Codec
//!
//! Pure functions computing and applying sparse differences between two
//! [`AttributeSet`]s. A diff maps each changed key to either its new value or
//! the delete-marker [`DiffValue::Deleted`], which removes the key when
//! applied. Diffs are shallow over top-level keys; values are compared deeply.
//!
//! An empty diff is never stored: [`diff`] returns `None` instead, and
//! [`AttributeDiff`] refuses to outlive its last entry in the staged chain.

use std::collections::{btree_map, BTreeMap};

use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, SerializeMap, Serializer},
};

use crate::value::{AttributeSet, AttributeValue};

/// Key of the tagged record that encodes a delete-marker.
pub const DELETED_MARKER_KEY: &str = "__deleted";

/// One entry of an [`AttributeDiff`].
#[derive(Clone, Debug, PartialEq)]
pub enum DiffValue {
    /// Overwrite the attribute with this value.
    Set(AttributeValue),
    /// Remove the attribute.
    Deleted,
}

impl DiffValue {
    /// `Some(value)` for `Set`, `None` for the delete-marker.
    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            DiffValue::Set(value) => Some(value),
            DiffValue::Deleted => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, DiffValue::Deleted)
    }

    /// Converts an optional value back into a diff entry.
    pub fn from_option(value: Option<AttributeValue>) -> Self {
        match value {
            Some(value) => DiffValue::Set(value),
            None => DiffValue::Deleted,
        }
    }

    /// Whether this `Set` value would be read back as a delete-marker.
    pub fn collides_with_marker(&self) -> bool {
        match self {
            DiffValue::Set(AttributeValue::Record(record)) => is_marker_record(record),
            _ => false,
        }
    }
}

fn is_marker_record(record: &BTreeMap<String, AttributeValue>) -> bool {
    record.len() == 1 && record.get(DELETED_MARKER_KEY) == Some(&AttributeValue::Bool(true))
}

impl Serialize for DiffValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DiffValue::Set(value) => value.serialize(serializer),
            DiffValue::Deleted => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(DELETED_MARKER_KEY, &true)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DiffValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = AttributeValue::deserialize(deserializer)?;
        match &value {
            AttributeValue::Record(record) if is_marker_record(record) => Ok(DiffValue::Deleted),
            _ => Ok(DiffValue::Set(value)),
        }
    }
}

/// Sparse change set between two attribute snapshots.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AttributeDiff {
    entries: BTreeMap<String, DiffValue>,
}

impl AttributeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&DiffValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: DiffValue) -> Option<DiffValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.entries.insert(key.into(), DiffValue::Set(value.into()));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), DiffValue::Deleted);
    }

    pub fn remove(&mut self, key: &str) -> Option<DiffValue> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, DiffValue> {
        self.entries.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DiffValue> {
        self.entries.iter()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &DiffValue) -> bool) {
        self.entries.retain(|key, value| keep(key, value));
    }

    /// `None` when empty, so callers can store the result directly.
    pub fn into_non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl FromIterator<(String, DiffValue)> for AttributeDiff {
    fn from_iter<I: IntoIterator<Item = (String, DiffValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for AttributeDiff {
    type Item = (String, DiffValue);
    type IntoIter = btree_map::IntoIter<String, DiffValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeDiff {
    type Item = (&'a String, &'a DiffValue);
    type IntoIter = btree_map::Iter<'a, String, DiffValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Computes the change set that turns `from` into `to`. Returns `None` if
/// they are structurally equal.
pub fn diff(from: &AttributeSet, to: &AttributeSet) -> Option<AttributeDiff> {
    let mut result = AttributeDiff::new();
    for (key, new_value) in to {
        if from.get(key) != Some(new_value) {
            result.insert(key.clone(), DiffValue::Set(new_value.clone()));
        }
    }
    for key in from.keys() {
        if !to.contains_key(key) {
            result.insert(key.clone(), DiffValue::Deleted);
        }
    }
    result.into_non_empty()
}

/// Returns `base` with `diff` overlaid.
pub fn apply(base: &AttributeSet, diff: &AttributeDiff) -> AttributeSet {
    let mut result = base.clone();
    apply_in_place(&mut result, diff);
    result
}

/// Overlays `diff` onto `target`.
pub fn apply_in_place(target: &mut AttributeSet, diff: &AttributeDiff) {
    for (key, value) in diff {
        match value {
            DiffValue::Set(value) => {
                target.insert(key.clone(), value.clone());
            }
            DiffValue::Deleted => {
                target.remove(key);
            }
        }
    }
}

/// Merges `incoming` into `target`; incoming entries win on shared keys.
pub fn merge_diff_into(target: &mut AttributeDiff, incoming: &AttributeDiff) {
    for (key, value) in incoming {
        target.insert(key.clone(), value.clone());
    }
}
