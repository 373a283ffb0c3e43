//! Filter expression algebra
//!
//! A `Filter` is a small predicate tree. It compiles to a parameterized
//! WHERE fragment (`compile`), evaluates directly against a `Model`
//! (`eval`), and can be read from the loose JSON nodes an external
//! definition builder produces (`parse`).
//!
//! Relationship filters may contain placeholders (`Operand::Field`,
//! `Operand::Param`); `Filter::resolve` turns them into literals before a
//! filter is compiled or evaluated.

mod compile;
mod eval;
mod parse;

pub use compile::{compile_order_by, compile_where, like_pattern};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{RelTreeError, Result};
use crate::model::{Model, Value};

/// Named external parameters available to placeholder resolution
pub type Params = BTreeMap<String, Value>;

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OperandRepr", into = "OperandRepr")]
pub enum Operand {
    /// A literal value
    Value(Value),
    /// A property of the related record: the parent for child filters and
    /// setters, the child for inverse filters
    Field(String),
    /// A named external parameter
    Param(String),
}

impl Operand {
    pub fn field(name: impl Into<String>) -> Self {
        Operand::Field(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Operand::Param(name.into())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::Value(_))
    }

    /// Substitute the placeholder, if any
    ///
    /// # Errors
    ///
    /// `UnresolvedPlaceholder` when the context record lacks the field, no
    /// context was given, or the parameter is missing.
    pub fn resolve(&self, context: Option<&Model>, params: &Params) -> Result<Value> {
        match self {
            Operand::Value(v) => Ok(v.clone()),
            Operand::Field(name) => context
                .and_then(|m| m.get(name))
                .ok_or_else(|| RelTreeError::UnresolvedPlaceholder {
                    placeholder: format!("field:{}", name),
                }),
            Operand::Param(name) => {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RelTreeError::UnresolvedPlaceholder {
                        placeholder: format!("param:{}", name),
                    })
            }
        }
    }
}

macro_rules! literal_operand {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(v.into())
                }
            }
        )*
    };
}

literal_operand!(Value, i64, i32, f64, bool, &str, String);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OperandRepr {
    Field { field: String },
    Param { param: String },
    Value(Value),
}

impl From<OperandRepr> for Operand {
    fn from(repr: OperandRepr) -> Self {
        match repr {
            OperandRepr::Field { field } => Operand::Field(field),
            OperandRepr::Param { param } => Operand::Param(param),
            OperandRepr::Value(v) => Operand::Value(v),
        }
    }
}

impl From<Operand> for OperandRepr {
    fn from(op: Operand) -> Self {
        match op {
            Operand::Field(field) => OperandRepr::Field { field },
            Operand::Param(param) => OperandRepr::Param { param },
            Operand::Value(v) => OperandRepr::Value(v),
        }
    }
}

/// Predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Filter {
    And { children: Vec<Filter> },
    Or { children: Vec<Filter> },
    Eq { property: String, value: Operand },
    Gt { property: String, value: Operand },
    Lt { property: String, value: Operand },
    In { property: String, values: Vec<Operand> },
    /// `*` matches any run of characters, `?` exactly one
    Like { property: String, value: Operand },
}

impl Filter {
    /// The always-true filter (an empty conjunction)
    pub fn always() -> Self {
        Filter::And {
            children: Vec::new(),
        }
    }

    pub fn all(children: Vec<Filter>) -> Self {
        Filter::And { children }
    }

    pub fn any(children: Vec<Filter>) -> Self {
        Filter::Or { children }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Operand>) -> Self {
        Filter::Eq {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Operand>) -> Self {
        Filter::Gt {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Operand>) -> Self {
        Filter::Lt {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(property: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        Filter::In {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn like(property: impl Into<String>, pattern: impl Into<Operand>) -> Self {
        Filter::Like {
            property: property.into(),
            value: pattern.into(),
        }
    }

    /// True for an empty AND/OR, which matches every row
    pub fn is_always(&self) -> bool {
        match self {
            Filter::And { children } | Filter::Or { children } => children.is_empty(),
            _ => false,
        }
    }

    /// Conjunction of two filters, flattening nested ANDs and dropping
    /// always-true operands
    pub fn and(self, other: Filter) -> Filter {
        let mut children = Vec::new();
        for part in [self, other] {
            match part {
                Filter::And { children: inner } => children.extend(inner),
                leaf => children.push(leaf),
            }
        }
        match children.len() {
            1 => children.remove(0),
            _ => Filter::And { children },
        }
    }

    /// Conjunction that also drops exact duplicate operands, keeping the
    /// first occurrence
    pub fn and_dedup(self, other: Filter) -> Filter {
        match self.and(other) {
            Filter::And { children } => {
                let mut unique: Vec<Filter> = Vec::with_capacity(children.len());
                for child in children {
                    if !unique.contains(&child) {
                        unique.push(child);
                    }
                }
                match unique.len() {
                    1 => unique.remove(0),
                    _ => Filter::And { children: unique },
                }
            }
            other => other,
        }
    }

    /// Replace every placeholder with its value
    ///
    /// # Errors
    ///
    /// `UnresolvedPlaceholder` if any placeholder cannot be resolved.
    pub fn resolve(&self, context: Option<&Model>, params: &Params) -> Result<Filter> {
        let resolve_one = |op: &Operand| op.resolve(context, params).map(Operand::Value);
        Ok(match self {
            Filter::And { children } => Filter::And {
                children: children
                    .iter()
                    .map(|c| c.resolve(context, params))
                    .collect::<Result<_>>()?,
            },
            Filter::Or { children } => Filter::Or {
                children: children
                    .iter()
                    .map(|c| c.resolve(context, params))
                    .collect::<Result<_>>()?,
            },
            Filter::Eq { property, value } => Filter::Eq {
                property: property.clone(),
                value: resolve_one(value)?,
            },
            Filter::Gt { property, value } => Filter::Gt {
                property: property.clone(),
                value: resolve_one(value)?,
            },
            Filter::Lt { property, value } => Filter::Lt {
                property: property.clone(),
                value: resolve_one(value)?,
            },
            Filter::In { property, values } => Filter::In {
                property: property.clone(),
                values: values.iter().map(resolve_one).collect::<Result<_>>()?,
            },
            Filter::Like { property, value } => Filter::Like {
                property: property.clone(),
                value: resolve_one(value)?,
            },
        })
    }

    /// True when the tree contains no placeholders
    pub fn is_literal(&self) -> bool {
        match self {
            Filter::And { children } | Filter::Or { children } => {
                children.iter().all(Filter::is_literal)
            }
            Filter::In { values, .. } => values.iter().all(Operand::is_literal),
            Filter::Eq { value, .. }
            | Filter::Gt { value, .. }
            | Filter::Lt { value, .. }
            | Filter::Like { value, .. } => value.is_literal(),
        }
    }

    /// Names of context-record fields referenced by placeholders
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<String>) {
        fn note(op: &Operand, out: &mut Vec<String>) {
            if let Operand::Field(name) = op {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        match self {
            Filter::And { children } | Filter::Or { children } => {
                for child in children {
                    child.collect_fields(out);
                }
            }
            Filter::In { values, .. } => values.iter().for_each(|v| note(v, out)),
            Filter::Eq { value, .. }
            | Filter::Gt { value, .. }
            | Filter::Lt { value, .. }
            | Filter::Like { value, .. } => note(value, out),
        }
    }

    /// JSON rendering used in error reports
    pub fn node_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }

    /// Evaluate against a record with the backing store's semantics
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for an empty IN list or an unresolved placeholder.
    pub fn matches(&self, model: &Model) -> Result<bool> {
        eval::matches(self, model)
    }

    /// Read a loose JSON node as handed over by a definition builder
    ///
    /// # Errors
    ///
    /// `InvalidFilter` carrying the offending node for unknown operations or
    /// malformed shapes.
    pub fn from_json(node: &serde_json::Value) -> Result<Filter> {
        parse::from_json(node)
    }
}

/// Check that a name can be spliced into SQL text as-is
///
/// # Errors
///
/// `InvalidIdentifier` unless the name matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(RelTreeError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}
