//! In-memory evaluation with the same semantics as the compiled SQL

use std::cmp::Ordering;

use super::compile::{invalid, like_pattern};
use super::{Filter, Operand};
use crate::errors::Result;
use crate::model::{Model, Value};

pub(super) fn matches(filter: &Filter, model: &Model) -> Result<bool> {
    match filter {
        Filter::And { children } => {
            for child in children {
                if !matches(child, model)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Filter::Or { children } => {
            if children.is_empty() {
                return Ok(true);
            }
            for child in children {
                if matches(child, model)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Filter::Eq { property, value } => {
            let actual = model.value(property);
            Ok(match literal(value, filter)? {
                Value::Null => actual.is_null(),
                expected => actual.sql_cmp(&expected) == Some(Ordering::Equal),
            })
        }
        Filter::Gt { property, value } => {
            let expected = literal(value, filter)?;
            Ok(model.value(property).sql_cmp(&expected) == Some(Ordering::Greater))
        }
        Filter::Lt { property, value } => {
            let expected = literal(value, filter)?;
            Ok(model.value(property).sql_cmp(&expected) == Some(Ordering::Less))
        }
        Filter::In { property, values } => {
            if values.is_empty() {
                return Err(invalid(filter, "IN list is empty"));
            }
            let actual = model.value(property);
            for value in values {
                if actual.sql_cmp(&literal(value, filter)?) == Some(Ordering::Equal) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Filter::Like { property, value } => {
            let Some(pattern) = literal(value, filter)?.sql_text() else {
                return Ok(false);
            };
            let pattern = like_pattern(&pattern);
            Ok(model
                .value(property)
                .sql_text()
                .is_some_and(|text| like_matches(&pattern, &text)))
        }
    }
}

fn literal(operand: &Operand, node: &Filter) -> Result<Value> {
    match operand {
        Operand::Value(v) => Ok(v.clone()),
        Operand::Field(name) | Operand::Param(name) => Err(invalid(
            node,
            &format!("unresolved placeholder '{}'", name),
        )),
    }
}

/// LIKE matching: `%` any run, `_` one character, ASCII case-insensitive
fn like_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let t: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}
