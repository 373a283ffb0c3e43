//! Command orchestration layer.
//!
//! ## Logging Ownership
//!
//! Commands own lifecycle logging:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Lower layers (store, core) use only `tracing::debug!()` for internal details.

pub mod open_nodes;
pub mod structure;
pub mod tree;
pub mod versions;

use reltree_core::core_types::RequestContext;
use reltree_core::RtError;

/// Tie an error to the request that produced it
pub(crate) fn with_request(err: RtError, ctx: &RequestContext) -> RtError {
    let err = err.with_request_id(ctx.request_id.clone());
    match &ctx.trace_id {
        Some(trace_id) => err.with_trace_id(trace_id.clone()),
        None => err,
    }
}
