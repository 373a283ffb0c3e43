use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::filter::{Filter, Operand, Params};
use crate::model::Model;

/// Assigns one property of a record that is being linked
///
/// `Operand::Field` reads from the parent record, `Operand::Param` from the
/// named external parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setter {
    pub property: String,
    pub value: Operand,
}

impl Setter {
    pub fn new(property: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Resolve and write the value onto `target`
    ///
    /// # Errors
    ///
    /// `UnresolvedPlaceholder` when the source field or parameter is absent.
    pub fn apply(&self, source: Option<&Model>, target: &mut Model, params: &Params) -> Result<()> {
        let value = self.value.resolve(source, params)?;
        target.set(self.property.clone(), value);
        Ok(())
    }
}

/// Which records of an entity are top level, and how to make one so
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCondition {
    pub entity: String,
    #[serde(default = "Filter::always")]
    pub filter: Filter,
    #[serde(default)]
    pub setters: Vec<Setter>,
}

impl RootCondition {
    pub fn new(entity: impl Into<String>, filter: Filter) -> Self {
        Self {
            entity: entity.into(),
            filter,
            setters: Vec::new(),
        }
    }

    pub fn with_setter(mut self, setter: Setter) -> Self {
        self.setters.push(setter);
        self
    }
}

/// How the records of `child_entity` hang below one `parent_entity` record
///
/// `filter` selects the children of a parent (its `Field` placeholders read
/// the parent). `inverse_filter` selects the parent of a child (its `Field`
/// placeholders read the child). When no inverse is declared one is derived
/// from the equality links in `filter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentChildCondition {
    pub parent_entity: String,
    pub child_entity: String,
    pub filter: Filter,
    #[serde(default)]
    pub setters: Vec<Setter>,
    #[serde(default)]
    pub inverse_filter: Option<Filter>,
}

impl ParentChildCondition {
    pub fn new(
        parent_entity: impl Into<String>,
        child_entity: impl Into<String>,
        filter: Filter,
    ) -> Self {
        Self {
            parent_entity: parent_entity.into(),
            child_entity: child_entity.into(),
            filter,
            setters: Vec::new(),
            inverse_filter: None,
        }
    }

    /// The common foreign-key shape: `child.<column> = parent.id`, linked
    /// by a setter copying the parent id
    pub fn foreign_key(
        parent_entity: impl Into<String>,
        child_entity: impl Into<String>,
        column: &str,
    ) -> Self {
        Self::new(
            parent_entity,
            child_entity,
            Filter::eq(column, Operand::field("id")),
        )
        .with_setter(Setter::new(column, Operand::field("id")))
    }

    pub fn with_setter(mut self, setter: Setter) -> Self {
        self.setters.push(setter);
        self
    }

    pub fn with_inverse(mut self, inverse: Filter) -> Self {
        self.inverse_filter = Some(inverse);
        self
    }

    /// The declared inverse filter, or one derived from `filter`
    ///
    /// Derivation flips every top-level `child_prop = parent.field` leaf into
    /// `field = child.child_prop`. Returns `None` when nothing can be flipped.
    pub fn effective_inverse(&self) -> Option<Filter> {
        if let Some(inverse) = &self.inverse_filter {
            return Some(inverse.clone());
        }
        let leaves: Vec<&Filter> = match &self.filter {
            Filter::And { children } => children.iter().collect(),
            leaf => vec![leaf],
        };
        let flipped: Vec<Filter> = leaves
            .into_iter()
            .filter_map(|leaf| match leaf {
                Filter::Eq {
                    property,
                    value: Operand::Field(parent_field),
                } => Some(Filter::eq(parent_field.clone(), Operand::field(property.clone()))),
                _ => None,
            })
            .collect();
        match flipped.len() {
            0 => None,
            1 => flipped.into_iter().next(),
            _ => Some(Filter::all(flipped)),
        }
    }

    /// Parent fields this condition reads when listing children or linking
    pub fn parent_fields(&self) -> Vec<String> {
        let mut fields = self.filter.referenced_fields();
        for setter in &self.setters {
            if let Operand::Field(name) = &setter.value {
                if !fields.contains(name) {
                    fields.push(name.clone());
                }
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn test_setter_reads_parent_field() {
        let parent = Model::with_id("a", 7);
        let mut child = Model::new("b");
        Setter::new("parent_id", Operand::field("id"))
            .apply(Some(&parent), &mut child, &Params::new())
            .unwrap();
        assert_eq!(child.get("parent_id"), Some(Value::Integer(7)));
    }

    #[test]
    fn test_derived_inverse_flips_links() {
        let cond = ParentChildCondition::new(
            "a",
            "b",
            Filter::all(vec![
                Filter::eq("parent_id", Operand::field("id")),
                Filter::eq("kind", "note"),
            ]),
        );
        assert_eq!(
            cond.effective_inverse(),
            Some(Filter::eq("id", Operand::field("parent_id")))
        );
    }

    #[test]
    fn test_no_inverse_without_links() {
        let cond = ParentChildCondition::new("a", "b", Filter::eq("kind", "note"));
        assert_eq!(cond.effective_inverse(), None);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = serde_json::json!({
            "parent_entity": "a",
            "child_entity": "b",
            "filter": {"op": "eq", "property": "parent_id", "value": {"field": "id"}},
            "setters": [{"property": "parent_id", "value": {"field": "id"}}]
        });
        let cond: ParentChildCondition = serde_json::from_value(json).unwrap();
        assert_eq!(cond, ParentChildCondition::foreign_key("a", "b", "parent_id"));

        let root: RootCondition =
            serde_json::from_value(serde_json::json!({"entity": "a"})).unwrap();
        assert!(root.filter.is_always());
        assert!(root.setters.is_empty());
    }

    #[test]
    fn test_parent_fields_include_setter_sources() {
        let cond = ParentChildCondition::foreign_key("a", "b", "parent_id")
            .with_setter(Setter::new("site", Operand::field("site")));
        assert_eq!(cond.parent_fields(), vec!["id", "site"]);
    }
}
