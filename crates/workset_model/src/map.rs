//! Name-keyed property value map.

use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapping from property name to scalar value.
///
/// Backed by a `BTreeMap` so iteration order is deterministic regardless of
/// insertion order. Diffs, dispatch payloads, and test assertions all rely
/// on that ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMap(BTreeMap<String, PropertyValue>);

impl ValueMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for literal construction.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a property value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Gets a property value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    /// Checks whether a property is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Removes a property, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.0.remove(name)
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over property names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over `(name, value)` pairs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copies every entry of `other` into this map, overwriting collisions.
    pub fn merge_from(&mut self, other: &Self) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Returns the names whose values differ from `other`.
    ///
    /// A name present on only one side counts as differing.
    #[must_use]
    pub fn diff_names(&self, other: &Self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, value) in &self.0 {
            if other.0.get(name) != Some(value) {
                names.push(name.clone());
            }
        }
        for name in other.0.keys() {
            if !self.0.contains_key(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

impl FromIterator<(String, PropertyValue)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, PropertyValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut map = ValueMap::new();
        map.set("title", "Dune");
        assert_eq!(map.get("title"), Some(&PropertyValue::Text("Dune".into())));
        assert!(map.contains("title"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn builder_style() {
        let map = ValueMap::new().with("a", 1i64).with("b", "two");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&PropertyValue::Integer(1)));
    }

    #[test]
    fn iteration_is_sorted() {
        let map = ValueMap::new().with("z", 1i64).with("a", 2i64).with("m", 3i64);
        let names: Vec<&str> = map.names().collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }

    #[test]
    fn merge_overwrites() {
        let mut base = ValueMap::new().with("a", 1i64).with("b", 1i64);
        let other = ValueMap::new().with("b", 2i64).with("c", 3i64);
        base.merge_from(&other);
        assert_eq!(base.get("a"), Some(&PropertyValue::Integer(1)));
        assert_eq!(base.get("b"), Some(&PropertyValue::Integer(2)));
        assert_eq!(base.get("c"), Some(&PropertyValue::Integer(3)));
    }

    #[test]
    fn diff_names_reports_both_sides() {
        let left = ValueMap::new().with("same", 1i64).with("changed", 1i64).with("only_left", 1i64);
        let right = ValueMap::new().with("same", 1i64).with("changed", 2i64).with("only_right", 1i64);
        assert_eq!(
            left.diff_names(&right),
            vec!["changed".to_string(), "only_left".into(), "only_right".into()]
        );
    }

    #[test]
    fn diff_names_empty_when_equal() {
        let map = ValueMap::new().with("a", 1i64);
        assert!(map.diff_names(&map.clone()).is_empty());
    }
}
