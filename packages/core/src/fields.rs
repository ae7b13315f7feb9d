//! Field maps: the value side of a record.
//!
//! Stores never interpret field values, so everything is kept as text.
//! Numbers are written through `Display` and parsed back by the caller.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered `name → value` map representing one record.
///
/// Uses `BTreeMap` so iteration (and therefore encoded output and test
/// assertions) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    /// Creates an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    ///
    /// ```
    /// use kvdex_core::Fields;
    ///
    /// let fields = Fields::new().with("status", "created").with("freight", 12.5);
    /// assert_eq!(fields.get("freight"), Some("12.5"));
    /// ```
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets `name` to `value`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Display) -> Option<String> {
        self.0.insert(name.into(), value.to_string())
    }

    /// Removes `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parses a field into `T`. Returns `None` when the field is absent or unparsable.
    #[must_use]
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Copies every field of `other` over this map. Fields not present in
    /// `other` are preserved.
    pub fn merge(&mut self, other: &Fields) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for Fields {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Display> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_preserves_unmentioned_fields() {
        let mut base = Fields::new().with("status", "created").with("customer_id", "C1");
        base.merge(&Fields::new().with("status", "shipped"));

        assert_eq!(base.get("status"), Some("shipped"));
        assert_eq!(base.get("customer_id"), Some("C1"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn parse_handles_numbers_and_garbage() {
        let fields = Fields::new().with("price", 19.9).with("qty", " 3 ").with("bad", "x1");

        assert_eq!(fields.parse::<f64>("price"), Some(19.9));
        assert_eq!(fields.parse::<u32>("qty"), Some(3));
        assert_eq!(fields.parse::<u32>("bad"), None);
        assert_eq!(fields.parse::<u32>("missing"), None);
    }

    #[test]
    fn collects_from_pairs() {
        let fields: Fields = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(fields.get("b"), Some("2"));
        assert!(fields.contains("a"));
        assert!(!fields.is_empty());
    }
}
