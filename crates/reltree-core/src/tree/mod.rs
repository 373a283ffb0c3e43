//! Tree materialization
//!
//! `TreeBuilder` walks a hierarchy through the relationship registry and
//! returns plain `TreeNode` values; nothing is written back to the models.

mod builder;
mod node;
mod options;

pub use builder::TreeBuilder;
pub use node::{ChildGroup, NodeState, OpenState, TreeNode};
pub use options::{TreeOptions, DEFAULT_SORT_PROPERTY};
