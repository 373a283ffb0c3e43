#![allow(clippy::unwrap_used, clippy::expect_used)]

use reltree_core::filter::{compile_order_by, compile_where};
use reltree_core::{Filter, Model, Operand, RelTreeError, SortKey, Value};
use serde_json::json;

#[test]
fn test_published_category_example() {
    let filter = Filter::all(vec![
        Filter::eq("status", "published"),
        Filter::is_in("category", vec![1, 2, 3]),
    ]);

    let (sql, params) = compile_where(&filter).unwrap();

    assert_eq!(sql, "(status = ?) AND (category IN (?,?,?))");
    assert_eq!(
        params,
        vec![
            Value::from("published"),
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]
    );
}

#[test]
fn test_json_node_compiles_like_builder_filter() {
    let node = json!({
        "op": "or",
        "children": [
            {"op": "like", "property": "title", "value": "Intro*"},
            {"op": ">", "property": "rank", "value": 3}
        ]
    });
    let parsed = Filter::from_json(&node).unwrap();
    let built = Filter::any(vec![Filter::like("title", "Intro*"), Filter::gt("rank", 3)]);
    assert_eq!(compile_where(&parsed).unwrap(), compile_where(&built).unwrap());

    let (sql, params) = compile_where(&parsed).unwrap();
    assert_eq!(sql, "(title LIKE ?) OR (rank > ?)");
    assert_eq!(params, vec![Value::from("Intro%"), Value::Integer(3)]);
}

#[test]
fn test_resolved_child_filter_compiles() {
    let template = Filter::eq("parent_id", Operand::field("id"));
    assert!(compile_where(&template).is_err());

    let resolved = template
        .resolve(Some(&Model::with_id("a", 5)), &Default::default())
        .unwrap();
    assert_eq!(
        compile_where(&resolved).unwrap(),
        ("parent_id = ?".to_string(), vec![Value::Integer(5)])
    );
}

#[test]
fn test_unknown_operation_carries_node() {
    let node = json!({"op": "near", "property": "geo", "value": 1});
    let err = Filter::from_json(&node).unwrap_err();
    match err {
        RelTreeError::InvalidFilter { node, .. } => assert!(node.contains("near")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_order_by_rejects_hostile_property() {
    assert!(compile_order_by(&[SortKey::asc("sorting; drop table b")]).is_err());
    assert_eq!(
        compile_order_by(&[SortKey::asc("sorting"), SortKey::asc("id")]).unwrap(),
        "sorting ASC, id ASC"
    );
}
