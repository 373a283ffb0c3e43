#![allow(clippy::unwrap_used, clippy::expect_used)]

// Integration tests for the structure commands over SQLite.

mod common;

use reltree_core::core_types::RequestContext;
use reltree_core::{
    Config, DataProvider, Filter, Model, Params, Placement, RecordId, RtErrorKind, SortKey,
    Value,
};
use reltree_engine::commands::structure::{
    create_child, create_root, find_parent, move_within, reparent, EditContext,
};
use reltree_store::SqliteProvider;

fn child_order(provider: &SqliteProvider<'_>, entity: &str, parent: i64) -> Vec<RecordId> {
    provider
        .fetch_ids(
            entity,
            &Config::new()
                .with_filter(Filter::eq("parent_id", parent))
                .sort_by(SortKey::asc("sorting"))
                .sort_by(SortKey::asc("id")),
        )
        .unwrap()
}

#[test]
fn test_create_child_links_and_appends() {
    let conn = common::ab_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();
    let ctx = EditContext::default();

    let parent = Model::with_id("a", 1);
    let mut child = Model::new("b").with("title", "B-new");
    let outcome = create_child(
        &mut provider,
        &registry,
        &ctx,
        &parent,
        &mut child,
        Some(&Placement::End),
    )
    .unwrap()
    .unwrap();

    assert_eq!(outcome.key, 512 + 256);
    assert_eq!(child.get("parent_id"), Some(Value::Integer(1)));
    let new_id = child.id().cloned().unwrap();
    assert_eq!(
        child_order(&provider, "b", 1),
        vec![RecordId::Int(11), RecordId::Int(10), new_id]
    );
}

#[test]
fn test_create_child_rejects_persisted_record() {
    let conn = common::ab_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();
    let ctx = EditContext::default();

    let mut existing = Model::with_id("b", 10);
    let err = create_child(
        &mut provider,
        &registry,
        &ctx,
        &Model::with_id("a", 1),
        &mut existing,
        None,
    )
    .unwrap_err();
    assert_eq!(err.kind(), RtErrorKind::InvalidArgument);
}

#[test]
fn test_missing_relationship_carries_request_id() {
    let conn = common::ab_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();
    let ctx = EditContext::new(RequestContext::new());

    let mut orphan = Model::new("c");
    let err = create_child(
        &mut provider,
        &registry,
        &ctx,
        &Model::with_id("a", 1),
        &mut orphan,
        Some(&Placement::End),
    )
    .unwrap_err();
    assert_eq!(err.kind(), RtErrorKind::MissingRelationship);
    assert_eq!(err.request_id(), Some(&ctx.request.request_id));
    assert!(!orphan.has_identity());
}

#[test]
fn test_create_root_at_start() {
    let conn = common::ab_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();
    let ctx = EditContext::default();

    let mut root = Model::new("a").with("title", "A0").with("parent_id", 99);
    let outcome = create_root(&mut provider, &registry, &ctx, &mut root, Some(&Placement::Start))
        .unwrap()
        .unwrap();
    assert_eq!(outcome.key, 128);
    // Root setter cleared the stray link
    let stored = provider
        .fetch("a", &Config::by_id(root.id().cloned().unwrap()))
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("parent_id"), Some(Value::Null));
}

#[test]
fn test_reparent_moves_between_scopes() {
    let conn = common::ab_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();
    let ctx = EditContext::default();

    let mut b12 = provider.fetch("b", &Config::by_id(12)).unwrap().unwrap();
    reparent(
        &mut provider,
        &registry,
        &ctx,
        &mut b12,
        Some(&Model::with_id("a", 1)),
        Some(&Placement::After(RecordId::Int(11))),
    )
    .unwrap();

    assert_eq!(
        child_order(&provider, "b", 1),
        vec![RecordId::Int(11), RecordId::Int(12), RecordId::Int(10)]
    );
    assert!(child_order(&provider, "b", 2).is_empty());
}

#[test]
fn test_reparent_below_own_descendant_is_rejected() {
    let conn = common::pages_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::pages_registry();
    let ctx = EditContext::default();

    let mut home = provider.fetch("pages", &Config::by_id(1)).unwrap().unwrap();
    let team = Model::with_id("pages", 3).with("parent_id", 2);
    let err = reparent(
        &mut provider,
        &registry,
        &ctx,
        &mut home,
        Some(&team),
        Some(&Placement::End),
    )
    .unwrap_err();
    assert_eq!(err.kind(), RtErrorKind::InvalidArgument);

    let stored = provider.fetch("pages", &Config::by_id(1)).unwrap().unwrap();
    assert_eq!(stored.get("parent_id"), Some(Value::Null));
}

#[test]
fn test_reparent_to_top_level() {
    let conn = common::pages_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::pages_registry();
    let ctx = EditContext::default();

    let mut team = provider.fetch("pages", &Config::by_id(3)).unwrap().unwrap();
    reparent(&mut provider, &registry, &ctx, &mut team, None, Some(&Placement::End)).unwrap();

    let roots = provider
        .fetch_ids(
            "pages",
            &Config::new()
                .with_filter(Filter::eq("parent_id", Value::Null))
                .sort_by(SortKey::asc("sorting")),
        )
        .unwrap();
    assert_eq!(roots, vec![RecordId::Int(1), RecordId::Int(4), RecordId::Int(3)]);
}

#[test]
fn test_move_within_only_rewrites_sort_key() {
    let conn = common::ab_connection();
    let mut provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();
    let ctx = EditContext::default();

    let mut b10 = Model::with_id("b", 10);
    let outcome = move_within(
        &mut provider,
        &registry,
        &ctx,
        &mut b10,
        Some(&Model::with_id("a", 1)),
        &Placement::Start,
    )
    .unwrap();
    assert_eq!(outcome.key, 128);
    assert_eq!(b10.get("sorting"), Some(Value::Integer(128)));
    assert_eq!(
        child_order(&provider, "b", 1),
        vec![RecordId::Int(10), RecordId::Int(11)]
    );
    let stored = provider.fetch("b", &Config::by_id(10)).unwrap().unwrap();
    assert_eq!(stored.get("title"), Some(Value::from("B10")));
}

#[test]
fn test_find_parent_reloads_partial_child() {
    let conn = common::ab_connection();
    let provider = SqliteProvider::new(&conn);
    let registry = common::ab_registry();

    let partial = Model::with_id("b", 12);
    let parent = find_parent(&provider, &registry, "a", &partial, &Params::new())
        .unwrap()
        .unwrap();
    assert_eq!(parent.id(), Some(&RecordId::Int(2)));

    let root = Model::with_id("a", 1).with("parent_id", Value::Null);
    assert_eq!(
        find_parent(&provider, &registry, "a", &Model::with_id("b", 999), &Params::new()).unwrap(),
        None
    );
    assert_eq!(
        find_parent(&provider, &registry, "b", &root, &Params::new())
            .unwrap_err()
            .kind(),
        RtErrorKind::MissingRelationship
    );
}
