//! reltree Store - SQLite persistence for the tree kernel
//!
//! Provides:
//! - `SqliteProvider`, the `DataProvider` over one SQLite connection
//! - Record version snapshots with a single active version per record
//! - Persisted open-node state per tree view
//! - Migrations framework and TOML settings

pub mod db;
pub mod errors;
pub mod migrations;
pub mod open_state;
pub mod provider;
pub mod settings;
mod sql_value;
pub mod versioning;

// Re-export key types
pub use errors::Result;
pub use provider::SqliteProvider;
pub use settings::{EntitySettings, IdGenerator, Settings};
pub use versioning::{VersionInfo, Versioning};
