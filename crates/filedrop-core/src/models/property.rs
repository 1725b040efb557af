use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-file custom properties.
///
/// Keys are case-insensitive: they are normalised to lower case on insertion, so
/// `Caption` and `caption` address the same entry. A later insertion replaces the
/// earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct PropertyBag(BTreeMap<String, String>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, returning the previous value for the same (case-folded) key.
    /// Blank keys are ignored.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.0.insert(key, value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.trim().to_lowercase()).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for PropertyBag {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut bag = PropertyBag::new();
        for (key, value) in map {
            bag.insert(&key, value);
        }
        bag
    }
}
