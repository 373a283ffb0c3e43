//! Compilation of filters to parameterized SQL fragments
//!
//! Values are never spliced into the text: every literal becomes a `?`
//! placeholder and is pushed onto the parameter list in textual order.
//! Property names are validated as identifiers before they are emitted.

use super::{validate_identifier, Filter, Operand};
use crate::config::{Direction, SortKey};
use crate::errors::{RelTreeError, Result};
use crate::model::Value;

const ALWAYS_TRUE: &str = "1 = 1";

/// Compile a filter to `(where_text, ordered_params)`
///
/// # Errors
///
/// `InvalidFilter` (carrying the offending node) for an empty IN list or a
/// placeholder that was not resolved; `InvalidIdentifier` for a property
/// name that is not a plain identifier.
pub fn compile_where(filter: &Filter) -> Result<(String, Vec<Value>)> {
    let mut sql = String::new();
    let mut params = Vec::new();
    emit(filter, &mut sql, &mut params)?;
    Ok((sql, params))
}

/// Compile a sort list to `a ASC, b DESC` (empty for an empty list)
///
/// # Errors
///
/// `InvalidIdentifier` for a property name that is not a plain identifier.
pub fn compile_order_by(sort: &[SortKey]) -> Result<String> {
    let parts = sort
        .iter()
        .map(|key| {
            let property = validate_identifier(&key.property)?;
            let dir = match key.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            Ok(format!("{} {}", property, dir))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

/// Rewrite user wildcards (`*`, `?`) to LIKE wildcards (`%`, `_`)
pub fn like_pattern(pattern: &str) -> String {
    pattern
        .chars()
        .map(|c| match c {
            '*' => '%',
            '?' => '_',
            other => other,
        })
        .collect()
}

fn emit(filter: &Filter, sql: &mut String, params: &mut Vec<Value>) -> Result<()> {
    match filter {
        Filter::And { children } => emit_group(children, " AND ", sql, params),
        Filter::Or { children } => emit_group(children, " OR ", sql, params),
        Filter::Eq { property, value } => {
            let property = validate_identifier(property)?;
            match literal(value, filter)? {
                Value::Null => sql.push_str(&format!("{} IS NULL", property)),
                v => emit_comparison(property, "=", v, sql, params),
            }
            Ok(())
        }
        Filter::Gt { property, value } => {
            let property = validate_identifier(property)?;
            emit_comparison(property, ">", literal(value, filter)?, sql, params);
            Ok(())
        }
        Filter::Lt { property, value } => {
            let property = validate_identifier(property)?;
            emit_comparison(property, "<", literal(value, filter)?, sql, params);
            Ok(())
        }
        Filter::In { property, values } => {
            let property = validate_identifier(property)?;
            if values.is_empty() {
                return Err(invalid(filter, "IN list is empty"));
            }
            let placeholders = vec!["?"; values.len()].join(",");
            for value in values {
                params.push(literal(value, filter)?);
            }
            sql.push_str(&format!("{} IN ({})", property, placeholders));
            Ok(())
        }
        Filter::Like { property, value } => {
            let property = validate_identifier(property)?;
            let bound = match literal(value, filter)?.sql_text() {
                Some(text) => Value::Text(like_pattern(&text)),
                None => Value::Null,
            };
            emit_comparison(property, "LIKE", bound, sql, params);
            Ok(())
        }
    }
}

fn emit_group(
    children: &[Filter],
    joiner: &str,
    sql: &mut String,
    params: &mut Vec<Value>,
) -> Result<()> {
    if children.is_empty() {
        sql.push_str(ALWAYS_TRUE);
        return Ok(());
    }
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            sql.push_str(joiner);
        }
        sql.push('(');
        emit(child, sql, params)?;
        sql.push(')');
    }
    Ok(())
}

fn emit_comparison(
    property: &str,
    op: &str,
    value: Value,
    sql: &mut String,
    params: &mut Vec<Value>,
) {
    sql.push_str(&format!("{} {} ?", property, op));
    params.push(value);
}

fn literal(operand: &Operand, node: &Filter) -> Result<Value> {
    match operand {
        Operand::Value(v) => Ok(v.clone()),
        Operand::Field(name) => Err(invalid(
            node,
            &format!("unresolved field placeholder '{}'", name),
        )),
        Operand::Param(name) => Err(invalid(
            node,
            &format!("unresolved parameter placeholder '{}'", name),
        )),
    }
}

pub(super) fn invalid(node: &Filter, reason: &str) -> RelTreeError {
    RelTreeError::InvalidFilter {
        node: node.node_json(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_with_in_list() {
        let f = Filter::all(vec![
            Filter::eq("status", "published"),
            Filter::is_in("category", vec![1, 2, 3]),
        ]);
        let (sql, params) = compile_where(&f).unwrap();

        assert_eq!(sql, "(status = ?) AND (category IN (?,?,?))");
        assert_eq!(
            params,
            vec![
                Value::from("published"),
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3)
            ]
        );
    }

    #[test]
    fn test_nested_or() {
        let f = Filter::any(vec![
            Filter::gt("rank", 10),
            Filter::all(vec![Filter::lt("rank", 0), Filter::eq("pinned", 1)]),
        ]);
        let (sql, params) = compile_where(&f).unwrap();

        assert_eq!(sql, "(rank > ?) OR ((rank < ?) AND (pinned = ?))");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_empty_groups_are_always_true() {
        assert_eq!(compile_where(&Filter::always()).unwrap().0, "1 = 1");
        assert_eq!(compile_where(&Filter::any(vec![])).unwrap().0, "1 = 1");
    }

    #[test]
    fn test_eq_null_is_null_check() {
        let (sql, params) = compile_where(&Filter::eq("parent_id", Value::Null)).unwrap();
        assert_eq!(sql, "parent_id IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_like_rewrites_wildcards_before_binding() {
        let (sql, params) = compile_where(&Filter::like("title", "ab*c?")).unwrap();
        assert_eq!(sql, "title LIKE ?");
        assert_eq!(params, vec![Value::from("ab%c_")]);
    }

    #[test]
    fn test_empty_in_is_invalid_and_carries_node() {
        let f = Filter::is_in("category", Vec::<i64>::new());
        match compile_where(&f).unwrap_err() {
            RelTreeError::InvalidFilter { node, .. } => assert!(node.contains("category")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_placeholder_is_invalid() {
        let f = Filter::eq("parent_id", Operand::field("id"));
        assert!(matches!(
            compile_where(&f),
            Err(RelTreeError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let f = Filter::eq("title", "x' OR '1'='1");
        let (sql, _) = compile_where(&f).unwrap();
        assert_eq!(sql, "title = ?");
    }

    #[test]
    fn test_hostile_property_rejected() {
        let f = Filter::eq("title = title OR 1", 1);
        assert!(matches!(
            compile_where(&f),
            Err(RelTreeError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_order_by() {
        let sort = vec![SortKey::asc("sorting"), SortKey::desc("id")];
        assert_eq!(compile_order_by(&sort).unwrap(), "sorting ASC, id DESC");
        assert_eq!(compile_order_by(&[]).unwrap(), "");
    }
}
