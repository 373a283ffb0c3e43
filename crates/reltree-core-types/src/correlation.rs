//! Correlation types for request tracking
//!
//! Every tree load or write happens inside one inbound request. These types
//! let log lines and errors from the store and the tree builder be tied back
//! to that request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! correlation_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh identifier (UUIDv7, time ordered)
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wrap an identifier received from the caller
            pub fn from_string(s: String) -> Self {
                Self(s)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

correlation_id!(
    /// Identifier of one inbound admin request
    RequestId
);

correlation_id!(
    /// Identifier propagated from an upstream tracing system
    TraceId
);

/// Request-scoped context handed to write operations
///
/// `author` is recorded on saved versions; `scope` names the persisted
/// open-node set (usually one per user and panel).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
    pub author: Option<String>,
    pub scope: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            trace_id: None,
            author: None,
            scope: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Author name recorded on versions, `"system"` when the caller is anonymous
    pub fn author_or_system(&self) -> &str {
        self.author.as_deref().unwrap_or("system")
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_context_author_defaults_to_system() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.author_or_system(), "system");

        let ctx = ctx.with_author("editor");
        assert_eq!(ctx.author_or_system(), "editor");
    }

    #[test]
    fn test_context_with_scope_and_trace() {
        let trace_id = TraceId::new();
        let ctx = RequestContext::new()
            .with_scope("user:7:pages")
            .with_trace_id(trace_id.clone());

        assert_eq!(ctx.scope.as_deref(), Some("user:7:pages"));
        assert_eq!(ctx.trace_id, Some(trace_id));
    }

    #[test]
    fn test_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
