#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use proptest::prelude::*;
use reltree_core::relationship::{apply_root_setters, RegistryDefinition};
use reltree_core::{
    Filter, Model, Operand, ParentChildCondition, Params, RegistrationMode, RelTreeError,
    RelationshipRegistry, RootCondition, Setter, Value,
};

proptest! {
    #[test]
    fn prop_root_setters_idempotent(parent in prop::option::of(0i64..100), title in "[a-z]{0,8}") {
        let root = RootCondition::new("a", Filter::eq("parent_id", Value::Null))
            .with_setter(Setter::new("parent_id", Value::Null))
            .with_setter(Setter::new("site", Operand::param("site")));
        let mut params = Params::new();
        params.insert("site".to_string(), Value::from("main"));

        let mut once = Model::with_id("a", 1)
            .with("parent_id", parent)
            .with("title", title);
        apply_root_setters(&mut once, &root, &params).unwrap();
        let mut twice = once.clone();
        apply_root_setters(&mut twice, &root, &params).unwrap();

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.get("parent_id"), Some(Value::Null));
    }
}

#[test]
fn test_child_filter_resolves_parent_and_params() {
    let mut registry = RelationshipRegistry::new();
    registry
        .register_child(
            ParentChildCondition::new(
                "pages",
                "blocks",
                Filter::all(vec![
                    Filter::eq("page_id", Operand::field("id")),
                    Filter::eq("lang", Operand::param("lang")),
                ]),
            ),
            RegistrationMode::Replace,
        )
        .unwrap();

    let mut params = Params::new();
    params.insert("lang".to_string(), Value::from("de"));
    let filter = registry
        .compute_child_filter("pages", "blocks", &Model::with_id("pages", 4), &params)
        .unwrap();
    assert_eq!(
        filter,
        Filter::all(vec![Filter::eq("page_id", 4), Filter::eq("lang", "de")])
    );

    let missing = registry.compute_child_filter(
        "pages",
        "blocks",
        &Model::with_id("pages", 4),
        &Params::new(),
    );
    assert!(matches!(missing, Err(RelTreeError::UnresolvedPlaceholder { .. })));
}

#[test]
fn test_reparent_with_setters_moves_child() {
    let registry = common::ab_registry();
    let mut child = Model::with_id("b", 10).with("parent_id", 1);

    registry
        .link_child(&Model::with_id("a", 2), &mut child, &Params::new())
        .unwrap();
    assert_eq!(child.get("parent_id"), Some(Value::Integer(2)));

    let parent_filter = registry
        .compute_parent_filter("a", &child, &Params::new())
        .unwrap();
    assert_eq!(parent_filter, Filter::eq("id", 2));
}

#[test]
fn test_merge_registration_dedups_leaves() {
    let leaf = Filter::eq("parent_id", Operand::field("id"));
    let definition = RegistryDefinition {
        roots: Vec::new(),
        relationships: vec![
            ParentChildCondition::new("a", "b", leaf.clone()),
            ParentChildCondition::new("a", "b", leaf.clone()),
        ],
    };

    let merged =
        RelationshipRegistry::from_definition(definition.clone(), RegistrationMode::Merge).unwrap();
    assert_eq!(merged.child_condition("a", "b").unwrap().filter, leaf);
    assert_eq!(merged.child_conditions("a").len(), 1);

    let replaced =
        RelationshipRegistry::from_definition(definition, RegistrationMode::Replace).unwrap();
    assert_eq!(replaced.child_condition("a", "b").unwrap().filter, leaf);
}

#[test]
fn test_missing_relationship_deterministic() {
    let registry = common::ab_registry();
    let first = registry.require_child_condition("b", "a").unwrap_err();
    let second = registry.require_child_condition("b", "a").unwrap_err();
    assert_eq!(first, second);
}
