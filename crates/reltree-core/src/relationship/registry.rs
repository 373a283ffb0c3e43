use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::condition::{ParentChildCondition, RootCondition, Setter};
use crate::errors::{RelTreeError, Result};
use crate::filter::{validate_identifier, Filter, Params};
use crate::model::Model;

/// What happens when a condition is registered for a key that already has one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationMode {
    /// Overwrite the existing condition
    Replace,
    /// AND the filters (flattened, identical leaves dropped), upsert the
    /// setters by property with the later value winning
    #[default]
    Merge,
}

/// Serialized form handed over by a definition builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDefinition {
    #[serde(default)]
    pub roots: Vec<RootCondition>,
    #[serde(default)]
    pub relationships: Vec<ParentChildCondition>,
}

/// Per-entity root and parent/child conditions
///
/// Built once, then shared read-only for the lifetime of a request.
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    roots: BTreeMap<String, RootCondition>,
    /// Keyed by parent entity; children kept in declaration order
    children: BTreeMap<String, Vec<ParentChildCondition>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a definition, merging repeated keys
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` for an entity name that is not a plain identifier.
    pub fn from_definition(definition: RegistryDefinition, mode: RegistrationMode) -> Result<Self> {
        let mut registry = Self::new();
        for root in definition.roots {
            registry.register_root(root, mode)?;
        }
        for rel in definition.relationships {
            registry.register_child(rel, mode)?;
        }
        Ok(registry)
    }

    /// # Errors
    ///
    /// `Serialization` for malformed JSON, otherwise as `from_definition`.
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: RegistryDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition, RegistrationMode::Merge)
    }

    /// # Errors
    ///
    /// `InvalidIdentifier` for an entity name that is not a plain identifier.
    pub fn register_root(
        &mut self,
        condition: RootCondition,
        mode: RegistrationMode,
    ) -> Result<()> {
        validate_identifier(&condition.entity)?;
        match self.roots.get_mut(&condition.entity) {
            Some(existing) if mode == RegistrationMode::Merge => {
                tracing::debug!(entity = %condition.entity, "merging root condition");
                existing.filter = merge_filters(existing.filter.clone(), condition.filter);
                merge_setters(&mut existing.setters, condition.setters);
            }
            _ => {
                self.roots.insert(condition.entity.clone(), condition);
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidIdentifier` for an entity name that is not a plain identifier.
    pub fn register_child(
        &mut self,
        condition: ParentChildCondition,
        mode: RegistrationMode,
    ) -> Result<()> {
        validate_identifier(&condition.parent_entity)?;
        validate_identifier(&condition.child_entity)?;
        let siblings = self
            .children
            .entry(condition.parent_entity.clone())
            .or_default();
        let existing = siblings
            .iter_mut()
            .find(|c| c.child_entity == condition.child_entity);
        match existing {
            Some(existing) if mode == RegistrationMode::Merge => {
                tracing::debug!(
                    parent_entity = %condition.parent_entity,
                    child_entity = %condition.child_entity,
                    "merging child condition"
                );
                existing.filter = merge_filters(existing.filter.clone(), condition.filter);
                merge_setters(&mut existing.setters, condition.setters);
                let inverses = (existing.inverse_filter.take(), condition.inverse_filter);
                existing.inverse_filter = match inverses {
                    (Some(a), Some(b)) => Some(merge_filters(a, b)),
                    (a, b) => a.or(b),
                };
            }
            Some(existing) => *existing = condition,
            None => siblings.push(condition),
        }
        Ok(())
    }

    pub fn root_condition(&self, entity: &str) -> Option<&RootCondition> {
        self.roots.get(entity)
    }

    pub fn child_condition(&self, parent: &str, child: &str) -> Option<&ParentChildCondition> {
        self.child_conditions(parent)
            .iter()
            .find(|c| c.child_entity == child)
    }

    /// Outgoing conditions of `parent` in declaration order
    pub fn child_conditions(&self, parent: &str) -> &[ParentChildCondition] {
        self.children.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Conditions through which `child` hangs below any parent
    pub fn parent_conditions(&self, child: &str) -> Vec<&ParentChildCondition> {
        self.children
            .values()
            .flatten()
            .filter(|c| c.child_entity == child)
            .collect()
    }

    pub fn is_leaf(&self, entity: &str) -> bool {
        self.child_conditions(entity).is_empty()
    }

    /// # Errors
    ///
    /// `MissingRootCondition` when none is registered.
    pub fn require_root_condition(&self, entity: &str) -> Result<&RootCondition> {
        self.root_condition(entity)
            .ok_or_else(|| RelTreeError::MissingRootCondition {
                entity: entity.to_string(),
            })
    }

    /// # Errors
    ///
    /// `MissingChildCondition` when none is registered for the pair.
    pub fn require_child_condition(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<&ParentChildCondition> {
        self.child_condition(parent, child)
            .ok_or_else(|| RelTreeError::MissingChildCondition {
                parent: parent.to_string(),
                child: child.to_string(),
            })
    }

    /// Literal filter selecting the top-level records of `entity`
    ///
    /// # Errors
    ///
    /// `MissingRootCondition`, or `UnresolvedPlaceholder` for a missing
    /// parameter (field placeholders have no record to read from here).
    pub fn compute_root_filter(&self, entity: &str, params: &Params) -> Result<Filter> {
        self.require_root_condition(entity)?
            .filter
            .resolve(None, params)
    }

    /// Literal filter selecting the `child_entity` records below `parent`
    ///
    /// # Errors
    ///
    /// `MissingChildCondition`, or `UnresolvedPlaceholder` when the parent
    /// lacks a referenced field or a parameter is missing.
    pub fn compute_child_filter(
        &self,
        parent_entity: &str,
        child_entity: &str,
        parent: &Model,
        params: &Params,
    ) -> Result<Filter> {
        self.require_child_condition(parent_entity, child_entity)?
            .filter
            .resolve(Some(parent), params)
    }

    /// Literal filter selecting the `parent_entity` record above `child`
    ///
    /// # Errors
    ///
    /// `MissingChildCondition`, `InvalidArgument` when no inverse can be
    /// derived, or `UnresolvedPlaceholder`.
    pub fn compute_parent_filter(
        &self,
        parent_entity: &str,
        child: &Model,
        params: &Params,
    ) -> Result<Filter> {
        let condition = self.require_child_condition(parent_entity, child.entity())?;
        let inverse = condition
            .effective_inverse()
            .ok_or_else(|| RelTreeError::InvalidArgument {
                reason: format!(
                    "no inverse filter from {} to {}",
                    child.entity(),
                    parent_entity
                ),
            })?;
        inverse.resolve(Some(child), params)
    }

    /// Look up the pair and link `child` below `parent`
    ///
    /// # Errors
    ///
    /// `MissingChildCondition` or `UnresolvedPlaceholder`.
    pub fn link_child(&self, parent: &Model, child: &mut Model, params: &Params) -> Result<()> {
        let condition = self.require_child_condition(parent.entity(), child.entity())?;
        apply_setters(parent, child, condition, params)
    }

    /// Look up the root condition and mark `model` as top level
    ///
    /// # Errors
    ///
    /// `MissingRootCondition` or `UnresolvedPlaceholder`.
    pub fn link_root(&self, model: &mut Model, params: &Params) -> Result<()> {
        let condition = self.require_root_condition(model.entity())?;
        apply_root_setters(model, condition, params)
    }
}

/// Copy each setter's resolved value onto `child`; `parent` is only read
///
/// # Errors
///
/// `UnresolvedPlaceholder` when the parent lacks a referenced field or a
/// parameter is missing. Nothing is written in that case.
pub fn apply_setters(
    parent: &Model,
    child: &mut Model,
    condition: &ParentChildCondition,
    params: &Params,
) -> Result<()> {
    apply_all(&condition.setters, Some(parent), child, params)
}

/// Mark `child` as top level
///
/// # Errors
///
/// `UnresolvedPlaceholder` for a missing parameter or a field placeholder.
pub fn apply_root_setters(
    child: &mut Model,
    condition: &RootCondition,
    params: &Params,
) -> Result<()> {
    apply_all(&condition.setters, None, child, params)
}

fn apply_all(
    setters: &[Setter],
    source: Option<&Model>,
    target: &mut Model,
    params: &Params,
) -> Result<()> {
    let mut staged = target.clone();
    for setter in setters {
        setter.apply(source, &mut staged, params)?;
    }
    *target = staged;
    Ok(())
}

fn merge_filters(existing: Filter, incoming: Filter) -> Filter {
    existing.and_dedup(incoming)
}

fn merge_setters(existing: &mut Vec<Setter>, incoming: Vec<Setter>) {
    for setter in incoming {
        match existing.iter_mut().find(|s| s.property == setter.property) {
            Some(slot) => *slot = setter,
            None => existing.push(setter),
        }
    }
}
