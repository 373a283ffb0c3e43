//! reltree Core - relational tree kernel
//!
//! This crate provides the store-independent pieces of the tree admin:
//! - Value, record and collection types with identity-based set algebra
//! - Filter expressions, their SQL compilation and in-memory evaluation
//! - Declarative root and parent/child relationships
//! - The `DataProvider` interface plus an in-memory implementation
//! - Lazy tree materialization driven by open/closed node state
//! - Sparse manual-order key allocation

pub mod config;
pub mod errors;
pub mod filter;
pub mod logging_facility;
pub mod model;
pub mod provider;
pub mod relationship;
pub mod sorting;
pub mod tree;

pub use reltree_core_types as core_types;

// Re-export commonly used types
pub use config::{Config, Direction, IdSelector, SortKey};
pub use errors::{ErrorClass, RelTreeError, Result, RtError, RtErrorKind};
pub use filter::{Filter, Operand, Params};
pub use model::{Annotations, Collection, Model, ModelKey, RecordId, Value};
pub use provider::{transaction, DataProvider, MemoryProvider, ProviderResult};
pub use relationship::{
    ParentChildCondition, RegistrationMode, RelationshipRegistry, RootCondition, Setter,
};
pub use sorting::{Placement, PlacementOutcome, SiblingScope, SortingPositionResolver};
pub use tree::{ChildGroup, NodeState, OpenState, TreeBuilder, TreeNode, TreeOptions};
