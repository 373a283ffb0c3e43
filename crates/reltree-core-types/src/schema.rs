//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names identical across every crate that logs.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Record identifiers
pub const FIELD_ENTITY: &str = "entity";
pub const FIELD_RECORD_ID: &str = "record_id";
pub const FIELD_PARENT_ENTITY: &str = "parent_entity";
pub const FIELD_CHILD_ENTITY: &str = "child_entity";

// Collection sizes
pub const FIELD_ROWS: &str = "rows";
pub const FIELD_NODES: &str = "nodes";
pub const FIELD_QUERIES: &str = "queries";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
