//! Declarative relationships between entities
//!
//! A `RootCondition` says which records of an entity are top level; a
//! `ParentChildCondition` says how records of one entity hang below a
//! record of another. The `RelationshipRegistry` holds both and resolves
//! their placeholder filters against concrete records.

mod condition;
mod registry;

pub use condition::{ParentChildCondition, RootCondition, Setter};
pub use registry::{
    apply_root_setters, apply_setters, RegistrationMode, RegistryDefinition,
    RelationshipRegistry,
};
