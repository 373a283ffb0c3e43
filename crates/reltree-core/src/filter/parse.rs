//! Reading filters from the loose JSON nodes of a definition builder
//!
//! Unlike the strict serde form, operation names are case-insensitive and
//! accept the symbolic aliases `=`, `>`, `<`. Anything unrecognised is
//! reported as `InvalidFilter` with the node that caused it.

use serde_json::Value as Json;

use super::{Filter, Operand};
use crate::errors::{RelTreeError, Result};
use crate::model::Value;

pub(super) fn from_json(node: &Json) -> Result<Filter> {
    let obj = node
        .as_object()
        .ok_or_else(|| invalid(node, "filter node must be an object"))?;
    let op = obj
        .get("op")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid(node, "missing operation"))?
        .to_ascii_lowercase();

    match op.as_str() {
        "and" | "or" => {
            let children = match obj.get("children") {
                None => Vec::new(),
                Some(Json::Array(items)) => {
                    items.iter().map(from_json).collect::<Result<Vec<_>>>()?
                }
                Some(_) => return Err(invalid(node, "children must be an array")),
            };
            Ok(if op == "and" {
                Filter::And { children }
            } else {
                Filter::Or { children }
            })
        }
        "eq" | "=" | "gt" | ">" | "lt" | "<" | "like" => {
            let property = property(node)?;
            let value = operand(
                obj.get("value")
                    .ok_or_else(|| invalid(node, "missing value"))?,
                node,
            )?;
            Ok(match op.as_str() {
                "eq" | "=" => Filter::Eq { property, value },
                "gt" | ">" => Filter::Gt { property, value },
                "lt" | "<" => Filter::Lt { property, value },
                _ => Filter::Like { property, value },
            })
        }
        "in" => {
            let property = property(node)?;
            let values = match obj.get("values") {
                Some(Json::Array(items)) if !items.is_empty() => items
                    .iter()
                    .map(|v| operand(v, node))
                    .collect::<Result<Vec<_>>>()?,
                Some(Json::Array(_)) => return Err(invalid(node, "IN list is empty")),
                _ => return Err(invalid(node, "values must be an array")),
            };
            Ok(Filter::In { property, values })
        }
        other => Err(invalid(node, &format!("unknown operation '{}'", other))),
    }
}

fn property(node: &Json) -> Result<String> {
    node.get("property")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(node, "missing property"))
}

fn operand(raw: &Json, node: &Json) -> Result<Operand> {
    if let Some(obj) = raw.as_object() {
        if let Some(Json::String(field)) = obj.get("field") {
            return Ok(Operand::Field(field.clone()));
        }
        if let Some(Json::String(param)) = obj.get("param") {
            return Ok(Operand::Param(param.clone()));
        }
        return Err(invalid(node, "operand object needs 'field' or 'param'"));
    }
    let value = match raw {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::from(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or_default()),
        },
        Json::String(s) => Value::Text(s.clone()),
        _ => return Err(invalid(node, "unsupported operand")),
    };
    Ok(Operand::Value(value))
}

fn invalid(node: &Json, reason: &str) -> RelTreeError {
    RelTreeError::InvalidFilter {
        node: node.to_string(),
        reason: reason.to_string(),
    }
}
