use reltree_core::{
    Filter, ParentChildCondition, RegistrationMode, RelationshipRegistry, RootCondition, Setter,
    Value,
};
use reltree_store::db;
use rusqlite::Connection;

/// A = {1, 2}; B = {10 -> 1, 11 -> 1, 12 -> 2}, with B11 ordered before B10
#[allow(dead_code)]
pub fn ab_connection() -> Connection {
    let conn = db::open_ready_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE a (id INTEGER PRIMARY KEY, title TEXT, parent_id INTEGER, sorting INTEGER);
         CREATE TABLE b (
             id INTEGER PRIMARY KEY,
             title TEXT NOT NULL DEFAULT '',
             parent_id INTEGER,
             sorting INTEGER
         );
         INSERT INTO a (id, title, parent_id, sorting) VALUES
             (1, 'A1', NULL, 256),
             (2, 'A2', NULL, 512);
         INSERT INTO b (id, title, parent_id, sorting) VALUES
             (10, 'B10', 1, 512),
             (11, 'B11', 1, 256),
             (12, 'B12', 2, 256);",
    )
    .unwrap();
    conn
}

#[allow(dead_code)]
pub fn ab_registry() -> RelationshipRegistry {
    let mut registry = RelationshipRegistry::new();
    registry
        .register_root(
            RootCondition::new("a", Filter::eq("parent_id", Value::Null))
                .with_setter(Setter::new("parent_id", Value::Null)),
            RegistrationMode::Replace,
        )
        .unwrap();
    registry
        .register_child(
            ParentChildCondition::foreign_key("a", "b", "parent_id"),
            RegistrationMode::Replace,
        )
        .unwrap();
    registry
}

/// Self-referencing pages: 1 > 2 > 3, and 4 as a second root
#[allow(dead_code)]
pub fn pages_connection() -> Connection {
    let conn = db::open_ready_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE pages (
             id INTEGER PRIMARY KEY,
             title TEXT,
             parent_id INTEGER,
             sorting INTEGER
         );
         INSERT INTO pages (id, title, parent_id, sorting) VALUES
             (1, 'Home', NULL, 256),
             (2, 'About', 1, 256),
             (3, 'Team', 2, 256),
             (4, 'Blog', NULL, 512);",
    )
    .unwrap();
    conn
}

#[allow(dead_code)]
pub fn pages_registry() -> RelationshipRegistry {
    let mut registry = RelationshipRegistry::new();
    registry
        .register_root(
            RootCondition::new("pages", Filter::eq("parent_id", Value::Null))
                .with_setter(Setter::new("parent_id", Value::Null)),
            RegistrationMode::Replace,
        )
        .unwrap();
    registry
        .register_child(
            ParentChildCondition::foreign_key("pages", "pages", "parent_id"),
            RegistrationMode::Replace,
        )
        .unwrap();
    registry
}
