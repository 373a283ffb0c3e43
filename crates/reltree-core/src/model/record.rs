use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::{RecordId, Value};
use crate::errors::{RelTreeError, Result};

/// Name of the primary key column on every entity table
pub const ID_PROPERTY: &str = "id";

/// Identity of a persisted record: entity name plus primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub entity: String,
    pub id: RecordId,
}

impl ModelKey {
    pub fn new(entity: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.id)
    }
}

/// One record of one entity
///
/// The id lives outside the property map and cannot change once assigned.
/// Transient view state (level, open state, child links) is never stored
/// here; see `TreeNode` and `Annotations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    entity: String,
    id: Option<RecordId>,
    properties: BTreeMap<String, Value>,
}

impl Model {
    /// Create a new, not yet persisted record
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: None,
            properties: BTreeMap::new(),
        }
    }

    /// Create a record that already has an identity (loaded from a store)
    pub fn with_id(entity: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            entity: entity.into(),
            id: Some(id.into()),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(property, value);
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn has_identity(&self) -> bool {
        self.id.is_some()
    }

    pub fn key(&self) -> Option<ModelKey> {
        self.id.as_ref().map(|id| ModelKey {
            entity: self.entity.clone(),
            id: id.clone(),
        })
    }

    /// Assign the primary key
    ///
    /// # Errors
    ///
    /// `IdentityImmutable` if a different id is already set. Re-assigning
    /// the same id is accepted.
    pub fn assign_id(&mut self, id: RecordId) -> Result<()> {
        match &self.id {
            Some(current) if *current != id => Err(RelTreeError::IdentityImmutable {
                entity: self.entity.clone(),
                current: current.to_string(),
                attempted: id.to_string(),
            }),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// Copy with identity cleared, ready to be saved as a new record
    pub fn copy_as_new(&self) -> Model {
        Model {
            entity: self.entity.clone(),
            id: None,
            properties: self.properties.clone(),
        }
    }

    /// Read a property; `id` is answered from the identity
    pub fn get(&self, property: &str) -> Option<Value> {
        if property == ID_PROPERTY {
            return self.id.as_ref().map(RecordId::to_value);
        }
        self.properties.get(property).cloned()
    }

    /// Read a property, treating a missing one as NULL
    pub fn value(&self, property: &str) -> Value {
        self.get(property).unwrap_or(Value::Null)
    }

    /// Set a property. Writes to `id` are ignored; use `assign_id`.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        let property = property.into();
        if property == ID_PROPERTY {
            return;
        }
        self.properties.insert(property, value.into());
    }

    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.properties.remove(property)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn into_properties(self) -> BTreeMap<String, Value> {
        self.properties
    }

    /// True when both records name the same persisted row
    pub fn same_identity(&self, other: &Model) -> bool {
        self.id.is_some() && self.entity == other.entity && self.id == other.id
    }
}
