use reltree_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using RelTreeError
pub type Result<T> = std::result::Result<T, RelTreeError>;

// ========== Error Facility ==========

/// Coarse classification handed to the external controller layer
///
/// Malformed requests are the caller's fault and never worth retrying;
/// runtime failures come from the store or from a registry that lacks a
/// relationship the request required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidArgument,
    RuntimeFailure,
}

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable code used by callers and tests. The same bad
/// input always produces the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtErrorKind {
    // Request validation
    InvalidArgument,
    InvalidFilter,
    IdentityImmutable,
    UnresolvedPlaceholder,
    NotFound,

    // Relationship resolution
    MissingRelationship,

    // Backing store
    Persistence,
    Serialization,
    Concurrency,
    Io,

    // Internal
    Internal,
}

impl RtErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            RtErrorKind::InvalidArgument => "ERR_INVALID_ARGUMENT",
            RtErrorKind::InvalidFilter => "ERR_INVALID_FILTER",
            RtErrorKind::IdentityImmutable => "ERR_IDENTITY_IMMUTABLE",
            RtErrorKind::UnresolvedPlaceholder => "ERR_UNRESOLVED_PLACEHOLDER",
            RtErrorKind::NotFound => "ERR_NOT_FOUND",
            RtErrorKind::MissingRelationship => "ERR_MISSING_RELATIONSHIP",
            RtErrorKind::Persistence => "ERR_PERSISTENCE",
            RtErrorKind::Serialization => "ERR_SERIALIZATION",
            RtErrorKind::Concurrency => "ERR_CONCURRENCY",
            RtErrorKind::Io => "ERR_IO",
            RtErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            RtErrorKind::InvalidArgument
            | RtErrorKind::InvalidFilter
            | RtErrorKind::IdentityImmutable
            | RtErrorKind::UnresolvedPlaceholder
            | RtErrorKind::NotFound => ErrorClass::InvalidArgument,
            RtErrorKind::MissingRelationship
            | RtErrorKind::Persistence
            | RtErrorKind::Serialization
            | RtErrorKind::Concurrency
            | RtErrorKind::Io
            | RtErrorKind::Internal => ErrorClass::RuntimeFailure,
        }
    }
}

/// Canonical structured error type
///
/// Returned at the provider and store boundary. Carries classification for
/// programmatic handling and context for debugging.
#[derive(Debug, Clone)]
pub struct RtError {
    kind: RtErrorKind,
    op: Option<String>,
    entity: Option<String>,
    record_id: Option<String>,
    node: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
}

impl RtError {
    pub fn new(kind: RtErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            record_id: None,
            node: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (table) context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add record id context
    pub fn with_record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }

    /// Attach the offending filter node (rendered as JSON)
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> RtErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    /// The filter node that failed to compile, if any
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for RtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(record_id) = &self.record_id {
            write!(f, " (record_id: {})", record_id)?;
        }
        if let Some(node) = &self.node {
            write!(f, " (node: {})", node)?;
        }
        Ok(())
    }
}

impl std::error::Error for RtError {}

// ========== End Error Facility ==========

/// Error taxonomy for the pure (store-independent) core operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelTreeError {
    // ===== Filter Errors =====
    /// A filter node cannot be compiled or evaluated
    #[error("Invalid filter node {node}: {reason}")]
    InvalidFilter { node: String, reason: String },

    /// An entity or property name is not a plain identifier
    #[error("Invalid identifier: {name:?}")]
    InvalidIdentifier { name: String },

    /// A field/param placeholder survived into a literal-only context
    #[error("Unresolved placeholder: {placeholder}")]
    UnresolvedPlaceholder { placeholder: String },

    // ===== Argument Errors =====
    /// Malformed request
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Attempt to change the id of a model that already has one
    #[error("Identity of {entity} record {current} is immutable (attempted {attempted})")]
    IdentityImmutable {
        entity: String,
        current: String,
        attempted: String,
    },

    /// Operation needs a persisted model but got an identity-less one
    #[error("{op} requires a {entity} record with an id")]
    MissingIdentity { entity: String, op: String },

    /// Placement anchor is not a member of the sibling scope
    #[error("Anchor {anchor} is not a sibling in the {entity} scope")]
    AnchorNotInScope { entity: String, anchor: String },

    // ===== Relationship Errors =====
    /// No root condition registered for the entity
    #[error("No root condition registered for entity {entity}")]
    MissingRootCondition { entity: String },

    /// No parent/child condition registered for the pair
    #[error("No relationship registered from {parent} to {child}")]
    MissingChildCondition { parent: String, child: String },

    // ===== Ordering Errors =====
    /// Renormalization left no room (cannot happen with a consistent store)
    #[error("No sort key room in {entity} scope after renormalization")]
    RenormalizationExhausted { entity: String },

    // ===== Generic Errors =====
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<RelTreeError> for RtError {
    fn from(err: RelTreeError) -> Self {
        match err {
            RelTreeError::InvalidFilter { node, reason } => RtError::new(RtErrorKind::InvalidFilter)
                .with_node(node)
                .with_message(reason),

            RelTreeError::InvalidIdentifier { name } => RtError::new(RtErrorKind::InvalidArgument)
                .with_message(format!("Invalid identifier: {:?}", name)),

            RelTreeError::UnresolvedPlaceholder { placeholder } => {
                RtError::new(RtErrorKind::UnresolvedPlaceholder)
                    .with_message(format!("Unresolved placeholder: {}", placeholder))
            }

            RelTreeError::InvalidArgument { reason } => {
                RtError::new(RtErrorKind::InvalidArgument).with_message(reason)
            }

            RelTreeError::IdentityImmutable {
                entity,
                current,
                attempted,
            } => RtError::new(RtErrorKind::IdentityImmutable)
                .with_entity(entity)
                .with_record_id(current)
                .with_message(format!("Cannot change id to {}", attempted)),

            RelTreeError::MissingIdentity { entity, op } => {
                RtError::new(RtErrorKind::InvalidArgument)
                    .with_entity(entity)
                    .with_op(op)
                    .with_message("Record has no id")
            }

            RelTreeError::AnchorNotInScope { entity, anchor } => {
                RtError::new(RtErrorKind::InvalidArgument)
                    .with_entity(entity)
                    .with_record_id(anchor)
                    .with_message("Anchor is not in the sibling scope")
            }

            RelTreeError::MissingRootCondition { entity } => {
                RtError::new(RtErrorKind::MissingRelationship)
                    .with_entity(entity)
                    .with_message("No root condition registered")
            }

            RelTreeError::MissingChildCondition { parent, child } => {
                RtError::new(RtErrorKind::MissingRelationship)
                    .with_entity(child)
                    .with_message(format!("No relationship registered from {}", parent))
            }

            RelTreeError::RenormalizationExhausted { entity } => {
                RtError::new(RtErrorKind::Internal)
                    .with_entity(entity)
                    .with_op("renormalize")
                    .with_message("No sort key room after renormalization")
            }

            RelTreeError::Serialization { message } => {
                RtError::new(RtErrorKind::Serialization).with_message(message)
            }

            RelTreeError::Internal { message } => {
                RtError::new(RtErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for RelTreeError {
    fn from(err: serde_json::Error) -> Self {
        RelTreeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RtError {
    fn from(err: serde_json::Error) -> Self {
        RelTreeError::from(err).into()
    }
}
