//! Ordered map type for notebook and cell metadata.
//!
//! This module provides [`Metadata`], a wrapper around [`IndexMap`] that keeps
//! keys in insertion order.
//!
//! ## Why IndexMap?
//!
//! Cell options are written back in the order they were read, so that a
//! round trip through a text notebook produces a minimal diff:
//!
//! - **Deterministic output**: `key=value` options serialize in a stable order
//! - **Minimal diffs**: re-encoding never shuffles options a user wrote by hand
//! - **Cheap removals**: [`Metadata::shift_remove`] keeps the remaining order
//!
//! Note that equality ignores order, as for JSON objects.
//!
//! ## Examples
//!
//! ```rust
//! use nbtext::{Metadata, Value};
//!
//! let mut map = Metadata::new();
//! map.insert("name".to_string(), Value::from("plot_1"));
//! map.insert("dpi".to_string(), Value::from(72));
//!
//! assert_eq!(map.len(), 2);
//! assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("plot_1"));
//! ```

use crate::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An ordered map of string keys to metadata values.
///
/// # Examples
///
/// ```rust
/// use nbtext::{Metadata, Value};
///
/// let mut map = Metadata::new();
/// map.insert("first".to_string(), Value::from(1));
/// map.insert("second".to_string(), Value::from(2));
///
/// let keys: Vec<_> = map.keys().cloned().collect();
/// assert_eq!(keys, vec!["first", "second"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata(IndexMap<String, Value>);

impl Metadata {
    /// Creates an empty `Metadata`.
    #[must_use]
    pub fn new() -> Self {
        Metadata(IndexMap::new())
    }

    /// Creates an empty `Metadata` with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Metadata(IndexMap::with_capacity(capacity))
    }

    /// Inserts a key-value pair into the map.
    ///
    /// An existing key keeps its position; the old value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::{Metadata, Value};
    ///
    /// let mut map = Metadata::new();
    /// assert!(map.insert("key".to_string(), Value::from(42)).is_none());
    /// assert!(map.insert("key".to_string(), Value::from(43)).is_some());
    /// ```
    pub fn insert(&mut self, key: String, value: Value) -> Option<Value> {
        self.0.insert(key, value)
    }

    /// Returns a reference to the value corresponding to the key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Returns the string value for the key, if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns `true` if the map contains the key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes a key, preserving the order of the remaining entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::{Metadata, Value};
    ///
    /// let mut map = Metadata::new();
    /// map.insert("a".to_string(), Value::from(1));
    /// map.insert("b".to_string(), Value::from(2));
    /// map.insert("c".to_string(), Value::from(3));
    /// map.shift_remove("a");
    ///
    /// let keys: Vec<_> = map.keys().cloned().collect();
    /// assert_eq!(keys, vec!["b", "c"]);
    /// ```
    pub fn shift_remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Returns the entry for `key`, inserting an empty object first if needed.
    ///
    /// A non-object value under `key` is replaced.
    pub fn object_entry(&mut self, key: &str) -> &mut Metadata {
        let slot = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Metadata::new()));
        if !slot.is_object() {
            *slot = Value::Object(Metadata::new());
        }
        match slot {
            Value::Object(obj) => obj,
            _ => unreachable!("slot was just made an object"),
        }
    }

    /// Returns the number of elements in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the keys of the map, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Returns an iterator over the values of the map, in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    /// Returns an iterator over the key-value pairs, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Keeps only the entries for which the predicate returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &Value) -> bool,
    {
        self.0.retain(|k, v| keep(k, v));
    }

    /// Returns a copy with keys sorted recursively.
    #[must_use]
    pub fn sorted(&self) -> Metadata {
        let mut entries: Vec<_> = self.0.iter().map(|(k, v)| (k.clone(), v.sorted())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }

    /// Merges `other` into `self`: nested objects are merged key by key,
    /// other values overwrite.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use nbtext::metadata;
    ///
    /// let mut base = metadata!({"jupytext": {"formats": "ipynb,py"}});
    /// let update = metadata!({"jupytext": {"main_language": "R"}});
    /// base.as_object_mut().unwrap().recursive_update(update.as_object().unwrap());
    ///
    /// let jupytext = base.as_object().unwrap().get("jupytext").unwrap();
    /// assert_eq!(jupytext.as_object().unwrap().len(), 2);
    /// ```
    pub fn recursive_update(&mut self, other: &Metadata) {
        for (key, value) in other.iter() {
            match (self.0.get_mut(key), value) {
                (Some(Value::Object(target)), Value::Object(update)) => {
                    target.recursive_update(update);
                }
                _ => {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl From<IndexMap<String, Value>> for Metadata {
    fn from(map: IndexMap<String, Value>) -> Self {
        Metadata(map)
    }
}

impl IntoIterator for Metadata {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Metadata(IndexMap::from_iter(iter))
    }
}

impl Serialize for Metadata {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Metadata::new()),
            other => Err(serde::de::Error::custom(format!(
                "expected a metadata object, found {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let map: Metadata = vec![
            ("z".to_string(), Value::from(1)),
            ("a".to_string(), Value::from(2)),
        ]
        .into_iter()
        .collect();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(map.sorted().keys().next().map(String::as_str), Some("a"));
    }

    #[test]
    fn test_object_entry_creates_nested() {
        let mut map = Metadata::new();
        map.object_entry("jupytext")
            .insert("main_language".to_string(), Value::from("R"));
        let nested = map.get("jupytext").and_then(Value::as_object).unwrap();
        assert_eq!(nested.get_str("main_language"), Some("R"));
    }

    #[test]
    fn test_deserialize_null_is_empty() {
        let map: Metadata = serde_json::from_str("null").unwrap();
        assert!(map.is_empty());
    }
}
