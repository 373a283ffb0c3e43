//! reltree Engine - Orchestration layer
//!
//! Provides high-level commands that coordinate the relationship registry,
//! the tree builder, key allocation and the SQLite store.

pub mod commands;
