//! Persisted open/collapsed node state
//!
//! A scope names one tree view (per user, per page, ...). Open nodes are
//! stored as rows; a wildcard row marks the whole scope as expanded.
//! Writes are plain read-modify-write, so the last writer wins.

#![allow(clippy::result_large_err)]

use reltree_core::{ModelKey, NodeState, OpenState};
use rusqlite::Connection;

use crate::errors::{from_rusqlite, Result};
use crate::sql_value::{id_from_sql, id_to_sql};

const WILDCARD: &str = "*";

/// Load the open set of `scope`
pub fn load_open_state(conn: &Connection, scope: &str) -> Result<OpenState> {
    let mut stmt = conn
        .prepare("SELECT entity, record_id FROM tree_open_nodes WHERE scope = ?1")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([scope], |row| {
            let entity: String = row.get(0)?;
            Ok((entity, id_from_sql(row.get_ref(1)?)))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    if rows.iter().any(|(entity, _)| entity == WILDCARD) {
        return Ok(OpenState::All);
    }
    Ok(OpenState::keys(rows.into_iter().filter_map(|(entity, id)| {
        id.map(|id| ModelKey { entity, id })
    })))
}

/// Mark one node open or collapsed
pub fn set_node_open(conn: &Connection, scope: &str, key: &ModelKey, open: bool) -> Result<()> {
    if open {
        conn.execute(
            "INSERT OR IGNORE INTO tree_open_nodes (scope, entity, record_id, opened_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                scope,
                key.entity,
                id_to_sql(&key.id),
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(from_rusqlite)?;
    } else {
        conn.execute(
            "DELETE FROM tree_open_nodes WHERE scope = ?1 AND entity = ?2 AND record_id = ?3",
            rusqlite::params![scope, key.entity, id_to_sql(&key.id)],
        )
        .map_err(from_rusqlite)?;
    }
    tracing::debug!(scope, key = %key, open, "open state written");
    Ok(())
}

/// Flip one node and return its new state
///
/// While the scope is fully expanded the node stays expanded.
pub fn toggle_node(conn: &Connection, scope: &str, key: &ModelKey) -> Result<NodeState> {
    let mut state = load_open_state(conn, scope)?;
    let next = state.toggle(key.clone());
    if !matches!(state, OpenState::All) {
        set_node_open(conn, scope, key, next == NodeState::Expanded)?;
    }
    Ok(next)
}

/// Expand every node of `scope`
pub fn expand_all(conn: &Connection, scope: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO tree_open_nodes (scope, entity, record_id, opened_at)
         VALUES (?1, ?2, ?2, ?3)",
        rusqlite::params![scope, WILDCARD, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(from_rusqlite)?;
    tracing::debug!(scope, "scope expanded");
    Ok(())
}

/// Collapse everything in `scope`
pub fn clear(conn: &Connection, scope: &str) -> Result<()> {
    conn.execute("DELETE FROM tree_open_nodes WHERE scope = ?1", [scope])
        .map_err(from_rusqlite)?;
    tracing::debug!(scope, "scope cleared");
    Ok(())
}
