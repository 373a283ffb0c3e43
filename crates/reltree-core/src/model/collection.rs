use std::collections::HashMap;

use super::record::{Model, ModelKey};
use super::value::RecordId;

/// Ordered sequence of records, deduplicated by identity
///
/// Membership and all set operations compare `(entity, id)`; two clones of
/// the same row with different property values are the same element.
/// Identity-less records are never deduplicated.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    models: Vec<Model>,
    /// Position in `models` of every identified record
    index: HashMap<ModelKey, usize>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            models: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Append a record unless one with the same identity is present
    ///
    /// Returns false when the record was a duplicate.
    pub fn push(&mut self, model: Model) -> bool {
        if let Some(key) = model.key() {
            if self.index.contains_key(&key) {
                return false;
            }
            self.index.insert(key, self.models.len());
        }
        self.models.push(model);
        true
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Model> {
        self.models.iter()
    }

    pub fn first(&self) -> Option<&Model> {
        self.models.first()
    }

    pub fn as_slice(&self) -> &[Model] {
        &self.models
    }

    pub fn into_vec(self) -> Vec<Model> {
        self.models
    }

    pub fn contains(&self, model: &Model) -> bool {
        model.key().is_some_and(|key| self.contains_key(&key))
    }

    pub fn contains_key(&self, key: &ModelKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &ModelKey) -> Option<&Model> {
        self.index.get(key).map(|&i| &self.models[i])
    }

    pub fn keys(&self) -> Vec<ModelKey> {
        self.models.iter().filter_map(Model::key).collect()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.models.iter().filter_map(|m| m.id().cloned()).collect()
    }

    /// Records of `self` followed by records of `other` not already present
    pub fn union(&self, other: &Collection) -> Collection {
        let mut out = self.clone();
        for model in other.iter() {
            out.push(model.clone());
        }
        out
    }

    /// Records of `self` whose identity also appears in `other`
    pub fn intersect(&self, other: &Collection) -> Collection {
        self.retain_by(|key| other.contains_key(key))
    }

    /// Records of `self` whose identity does not appear in `other`
    pub fn diff(&self, other: &Collection) -> Collection {
        self.retain_by(|key| !other.contains_key(key))
    }

    /// True when every identified record of `self` is in `other`
    pub fn is_subset(&self, other: &Collection) -> bool {
        self.index.keys().all(|key| other.contains_key(key))
    }

    /// Same elements regardless of order or property values
    pub fn same_members(&self, other: &Collection) -> bool {
        self.is_subset(other) && other.is_subset(self)
    }

    fn retain_by(&self, keep: impl Fn(&ModelKey) -> bool) -> Collection {
        self.models
            .iter()
            .filter(|m| m.key().is_some_and(|key| keep(&key)))
            .cloned()
            .collect()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.models == other.models
    }
}

impl FromIterator<Model> for Collection {
    fn from_iter<I: IntoIterator<Item = Model>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut collection = Collection::with_capacity(iter.size_hint().0);
        for model in iter {
            collection.push(model);
        }
        collection
    }
}

impl IntoIterator for Collection {
    type Item = Model;
    type IntoIter = std::vec::IntoIter<Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Model;
    type IntoIter = std::slice::Iter<'a, Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.iter()
    }
}
