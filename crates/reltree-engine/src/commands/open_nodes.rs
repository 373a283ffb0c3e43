//! Open-node commands for persisted tree views.
//!
//! The scope comes from the request context; a request without a scope is
//! rejected.

#![allow(clippy::result_large_err)]

use reltree_core::core_types::RequestContext;
use reltree_core::errors::RelTreeError;
use reltree_core::{log_op_end, log_op_error, log_op_start, ModelKey, NodeState, RtError};
use reltree_store::errors::Result;
use reltree_store::open_state;
use rusqlite::Connection;

use super::with_request;

fn scope_of(ctx: &RequestContext) -> Result<&str> {
    ctx.scope.as_deref().ok_or_else(|| {
        RtError::from(RelTreeError::InvalidArgument {
            reason: "request has no open-node scope".to_string(),
        })
    })
}

/// Run `f` against the request scope with lifecycle logging
fn scoped<T>(
    op: &str,
    conn: &Connection,
    ctx: &RequestContext,
    f: impl FnOnce(&Connection, &str) -> Result<T>,
) -> Result<T> {
    log_op_start!(op, request_id = ctx.request_id.as_str());
    let start = std::time::Instant::now();

    let result = scope_of(ctx)
        .and_then(|scope| f(conn, scope))
        .map_err(|e| {
            let e = with_request(e, ctx);
            log_op_error!(op, e.clone(), duration_ms = start.elapsed().as_millis() as u64);
            e
        })?;

    log_op_end!(op, duration_ms = start.elapsed().as_millis() as u64);
    Ok(result)
}

/// Open or collapse one node
pub fn node_set_open(
    conn: &Connection,
    ctx: &RequestContext,
    key: &ModelKey,
    open: bool,
) -> Result<()> {
    scoped("node_set_open", conn, ctx, |conn, scope| {
        open_state::set_node_open(conn, scope, key, open)
    })
}

/// Flip one node and return its new state
pub fn node_toggle(conn: &Connection, ctx: &RequestContext, key: &ModelKey) -> Result<NodeState> {
    scoped("node_toggle", conn, ctx, |conn, scope| {
        open_state::toggle_node(conn, scope, key)
    })
}

pub fn tree_expand_all(conn: &Connection, ctx: &RequestContext) -> Result<()> {
    scoped("tree_expand_all", conn, ctx, open_state::expand_all)
}

pub fn tree_collapse_all(conn: &Connection, ctx: &RequestContext) -> Result<()> {
    scoped("tree_collapse_all", conn, ctx, open_state::clear)
}
