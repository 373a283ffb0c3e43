#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use reltree_core::{
    Config, DataProvider, Model, Params, Placement, RecordId, RtErrorKind, SiblingScope,
    SortKey, SortingPositionResolver, Value,
};

#[test]
fn test_end_inserts_strictly_increase() {
    let mut provider = common::ab_provider();
    let registry = common::ab_registry();
    let resolver = SortingPositionResolver::default();
    let parent = Model::with_id("a", 2);
    let scope = SiblingScope::children_of(&registry, &parent, "b", &Params::new()).unwrap();

    let mut keys = Vec::new();
    for i in 0..10 {
        let mut child = Model::new("b").with("title", format!("n{}", i));
        registry.link_child(&parent, &mut child, &Params::new()).unwrap();
        let outcome = resolver
            .place(&mut provider, &scope, &mut child, &Placement::End)
            .unwrap();
        assert!(!outcome.renormalized);
        keys.push(outcome.key);
    }
    assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys {:?}", keys);
}

#[test]
fn test_insert_between_adjacent_keys_renormalizes_once() {
    let mut provider = common::ab_provider();
    provider.insert(
        Model::with_id("b", 13)
            .with("parent_id", 1)
            .with("sorting", 257),
    );
    let registry = common::ab_registry();
    let resolver = SortingPositionResolver::default();
    let parent = Model::with_id("a", 1);
    let scope = SiblingScope::children_of(&registry, &parent, "b", &Params::new()).unwrap();

    // siblings: 11@256, 13@257, 10@512
    let mut child = Model::new("b").with("parent_id", 1);
    let outcome = resolver
        .place(&mut provider, &scope, &mut child, &Placement::After(RecordId::Int(11)))
        .unwrap();
    assert!(outcome.renormalized);

    let order = provider
        .fetch_all(
            "b",
            &Config::new()
                .with_filter(scope.filter.clone())
                .sort_by(SortKey::asc("sorting")),
        )
        .unwrap()
        .ids();
    assert_eq!(
        order,
        vec![
            RecordId::Int(11),
            child.id().cloned().unwrap(),
            RecordId::Int(13),
            RecordId::Int(10)
        ]
    );

    // A second insert in the same spot has room again
    let mut another = Model::new("b").with("parent_id", 1);
    let second = resolver
        .place(&mut provider, &scope, &mut another, &Placement::After(RecordId::Int(11)))
        .unwrap();
    assert!(!second.renormalized);
}

#[test]
fn test_root_scope_start_placement() {
    let mut provider = common::ab_provider();
    provider.insert(Model::with_id("a", 1).with("parent_id", Value::Null).with("sorting", 256));
    provider.insert(Model::with_id("a", 2).with("parent_id", Value::Null).with("sorting", 512));
    let registry = common::ab_registry();
    let scope = SiblingScope::root(&registry, "a", &Params::new()).unwrap();
    let resolver = SortingPositionResolver::default();

    let mut root = Model::new("a").with("parent_id", Value::Null);
    let outcome = resolver
        .place(&mut provider, &scope, &mut root, &Placement::Start)
        .unwrap();
    assert_eq!(outcome.key, 128);
}

#[test]
fn test_failed_placement_writes_nothing() {
    let mut provider = common::ab_provider();
    let registry = common::ab_registry();
    let resolver = SortingPositionResolver::default();
    let scope =
        SiblingScope::children_of(&registry, &Model::with_id("a", 1), "b", &Params::new()).unwrap();

    let mut child = Model::new("b").with("parent_id", 1);
    let err = resolver
        .place(&mut provider, &scope, &mut child, &Placement::After(RecordId::Int(12)))
        .unwrap_err();
    assert_eq!(err.kind(), RtErrorKind::InvalidArgument);
    assert!(!child.has_identity());
    assert_eq!(provider.count("b", &Config::new()).unwrap(), 3);
}
