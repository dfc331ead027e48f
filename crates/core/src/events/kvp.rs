use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DataplaneError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered key value pairs. Position matters: fixed keys such as `eventType`
/// and `files` are located by index before being removed.
///
/// `append` and `remove` consume the sequence and hand back the updated one,
/// so a caller can never hold a stale copy after mutating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValuePairs(Vec<KeyValuePair>);

impl KeyValuePairs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn append(mut self, kvp: KeyValuePair) -> Self {
        self.0.push(kvp);
        self
    }

    pub fn remove(mut self, index: usize) -> Result<Self> {
        if index >= self.0.len() {
            return Err(DataplaneError::InvalidIndex {
                index,
                len: self.0.len(),
            });
        }
        self.0.remove(index);
        Ok(self)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.0.iter().position(|kvp| kvp.key == key)
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|kvp| kvp.key == key)
            .map(|kvp| kvp.value.as_str())
    }

    /// Later duplicates win, matching a left-to-right fold
    pub fn as_map(&self) -> HashMap<&str, &str> {
        self.0
            .iter()
            .map(|kvp| (kvp.key.as_str(), kvp.value.as_str()))
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyValuePair> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<KeyValuePair>> for KeyValuePairs {
    fn from(pairs: Vec<KeyValuePair>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<KeyValuePair> for KeyValuePairs {
    fn from_iter<I: IntoIterator<Item = KeyValuePair>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for KeyValuePairs {
    type Item = KeyValuePair;
    type IntoIter = std::vec::IntoIter<KeyValuePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a KeyValuePairs {
    type Item = &'a KeyValuePair;
    type IntoIter = std::slice::Iter<'a, KeyValuePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KeyValuePairs {
        KeyValuePairs::new()
            .append(KeyValuePair::new("eventType", "file_transcoded"))
            .append(KeyValuePair::new("files", "a.mp4,b.mp4"))
            .append(KeyValuePair::new("codec", "h264"))
    }

    #[test]
    fn append_returns_updated_sequence() {
        let kvps = sample();
        assert_eq!(kvps.len(), 3);
        assert_eq!(kvps.get("codec"), Some("h264"));
    }

    #[test]
    fn remove_shifts_following_pairs() {
        let kvps = sample().remove(0).unwrap();
        assert_eq!(kvps.len(), 2);
        assert_eq!(kvps.position("files"), Some(0));
        assert_eq!(kvps.get("eventType"), None);
    }

    #[test]
    fn remove_out_of_bounds_is_rejected() {
        let err = sample().remove(3).unwrap_err();
        assert!(matches!(err, DataplaneError::InvalidIndex { index: 3, len: 3 }));
    }

    #[test]
    fn serializes_as_plain_array() {
        let kvps = KeyValuePairs::new().append(KeyValuePair::new("k", "v"));
        let json = serde_json::to_string(&kvps).unwrap();
        assert_eq!(json, r#"[{"key":"k","value":"v"}]"#);
    }

    #[test]
    fn as_map_keeps_last_duplicate() {
        let kvps = KeyValuePairs::new()
            .append(KeyValuePair::new("k", "first"))
            .append(KeyValuePair::new("k", "second"));
        assert_eq!(kvps.as_map().get("k"), Some(&"second"));
        assert_eq!(kvps.get("k"), Some("first"));
    }
}
