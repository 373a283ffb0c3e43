use std::collections::{BTreeMap, HashMap};

use super::record::ModelKey;

/// Request-scoped view hints keyed by record identity
///
/// Holds rendering hints (assigned sort key, highlight flags, ...) for the
/// external view layer without touching the persisted record. Dropped at the
/// end of the request.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    hints: HashMap<ModelKey, BTreeMap<String, serde_json::Value>>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &ModelKey, hint: impl Into<String>, value: serde_json::Value) {
        self.hints
            .entry(key.clone())
            .or_default()
            .insert(hint.into(), value);
    }

    pub fn get(&self, key: &ModelKey, hint: &str) -> Option<&serde_json::Value> {
        self.hints.get(key).and_then(|h| h.get(hint))
    }

    /// All hints recorded for one record
    pub fn for_key(&self, key: &ModelKey) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.hints.get(key)
    }

    pub fn clear(&mut self, key: &ModelKey) {
        self.hints.remove(key);
    }

    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}
