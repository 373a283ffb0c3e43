//! Schema migrations for the side tables (`model_versions`, `tree_open_nodes`)
//!
//! Entity tables belong to the application; only the tables this crate
//! owns are migrated here.

mod embedded;
mod runner;

pub use runner::{applied_migrations, apply_migrations};
