//! Key/value labels attached to provider resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag set of a volume or snapshot.
///
/// Keys are unique; iteration order is by key so that rendered tag lists are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a tag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a tag with `key` exists, regardless of its value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the tag `key` exists with exactly `value`.
    pub fn has(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into `self`; tags in `other` win.
    pub fn merge(&mut self, other: &Tags) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_requires_exact_value() {
        let tags = Tags::new().with("CreatedBy", "AutomatedBackup");
        assert!(tags.has("CreatedBy", "AutomatedBackup"));
        assert!(!tags.has("CreatedBy", "automatedbackup"));
        assert!(!tags.has("createdby", "AutomatedBackup"));
    }

    #[test]
    fn test_contains_key_accepts_empty_value() {
        let tags = Tags::new().with("Name", "");
        assert!(tags.contains_key("Name"));
        assert_eq!(tags.get("Name"), Some(""));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut tags = Tags::new().with("Name", "old").with("Env", "prod");
        tags.merge(&Tags::new().with("Name", "new"));
        assert_eq!(tags.get("Name"), Some("new"));
        assert_eq!(tags.get("Env"), Some("prod"));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_serializes_as_map() {
        let tags: Tags = [("b", "2"), ("a", "1")].into_iter().collect();
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"2"}"#);
    }
}
