use std::collections::BTreeMap;

use crate::config::SortKey;
use crate::filter::Params;
use crate::model::{Value, ID_PROPERTY};
use crate::relationship::RelationshipRegistry;

/// Manual-order column used when an entity opts into sorting
pub const DEFAULT_SORT_PROPERTY: &str = "sorting";

/// Per-view knobs for a tree walk
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    sort_properties: BTreeMap<String, String>,
    labels: BTreeMap<String, Vec<String>>,
    pub params: Params,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order `entity` by the default manual-order column
    pub fn with_sorting(self, entity: impl Into<String>) -> Self {
        self.with_sort_property(entity, DEFAULT_SORT_PROPERTY)
    }

    pub fn with_sort_property(
        mut self,
        entity: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        self.sort_properties.insert(entity.into(), property.into());
        self
    }

    /// Fields needed to label records of `entity`; limits the projection
    pub fn with_labels<I, S>(mut self, entity: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels
            .insert(entity.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn sort_property(&self, entity: &str) -> Option<&str> {
        self.sort_properties.get(entity).map(String::as_str)
    }

    /// Manual order ascending, then id
    pub fn order_for(&self, entity: &str) -> Vec<SortKey> {
        let mut order = Vec::with_capacity(2);
        if let Some(property) = self.sort_property(entity) {
            order.push(SortKey::asc(property));
        }
        order.push(SortKey::asc(ID_PROPERTY));
        order
    }

    /// Columns to load for `entity`; empty means all
    ///
    /// Without declared labels everything is loaded. With labels the
    /// projection is labels, the sort column and every parent field the
    /// entity's own outgoing conditions read.
    pub fn projection_for(&self, entity: &str, registry: &RelationshipRegistry) -> Vec<String> {
        let Some(labels) = self.labels.get(entity) else {
            return Vec::new();
        };
        let mut fields = labels.clone();
        let mut add = |name: &str| {
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        };
        if let Some(property) = self.sort_property(entity) {
            add(property);
        }
        for condition in registry.child_conditions(entity) {
            for field in condition.parent_fields() {
                add(&field);
            }
        }
        fields
    }
}
