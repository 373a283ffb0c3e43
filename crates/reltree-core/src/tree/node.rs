use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{Annotations, Collection, Model, ModelKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Collapsed,
    Expanded,
}

/// Which nodes the user has opened
///
/// `All` overrides any individual entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenState {
    All,
    Keys(BTreeSet<ModelKey>),
}

impl Default for OpenState {
    fn default() -> Self {
        OpenState::Keys(BTreeSet::new())
    }
}

impl OpenState {
    /// Nothing open
    pub fn none() -> Self {
        Self::default()
    }

    pub fn keys<I: IntoIterator<Item = ModelKey>>(keys: I) -> Self {
        OpenState::Keys(keys.into_iter().collect())
    }

    pub fn is_open(&self, key: &ModelKey) -> bool {
        match self {
            OpenState::All => true,
            OpenState::Keys(keys) => keys.contains(key),
        }
    }

    pub fn state_of(&self, key: &ModelKey) -> NodeState {
        if self.is_open(key) {
            NodeState::Expanded
        } else {
            NodeState::Collapsed
        }
    }

    /// Open one node; no effect under `All`
    pub fn open(&mut self, key: ModelKey) {
        if let OpenState::Keys(keys) = self {
            keys.insert(key);
        }
    }

    /// Close one node; under `All` this has no effect until the wildcard
    /// is cleared
    pub fn close(&mut self, key: &ModelKey) {
        if let OpenState::Keys(keys) = self {
            keys.remove(key);
        }
    }

    /// Flip one node and return its new state
    pub fn toggle(&mut self, key: ModelKey) -> NodeState {
        if self.is_open(&key) {
            self.close(&key);
        } else {
            self.open(key.clone());
        }
        self.state_of(&key)
    }
}

/// Children of one declared child entity, in manual order
#[derive(Debug, Clone, PartialEq)]
pub struct ChildGroup {
    pub entity: String,
    pub nodes: Vec<TreeNode>,
}

/// One materialized record of a tree view
///
/// Collapsed nodes carry `has_children` but never any `children`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub model: Model,
    pub level: usize,
    pub state: NodeState,
    pub has_children: bool,
    pub parent: Option<ModelKey>,
    pub children: Vec<ChildGroup>,
}

impl TreeNode {
    pub fn key(&self) -> Option<ModelKey> {
        self.model.key()
    }

    pub fn is_expanded(&self) -> bool {
        self.state == NodeState::Expanded
    }

    pub fn child_group(&self, entity: &str) -> Option<&ChildGroup> {
        self.children.iter().find(|g| g.entity == entity)
    }

    /// Attached children of one entity as a collection (empty when collapsed)
    pub fn child_models(&self, entity: &str) -> Collection {
        self.child_group(entity)
            .map(|g| g.nodes.iter().map(|n| n.model.clone()).collect())
            .unwrap_or_default()
    }

    /// This node and every attached descendant, depth first
    pub fn walk(&self) -> Vec<&TreeNode> {
        let mut out = vec![self];
        for group in &self.children {
            for node in &group.nodes {
                out.extend(node.walk());
            }
        }
        out
    }

    /// Record structural metadata for the view layer
    pub fn annotate(&self, annotations: &mut Annotations) {
        for node in self.walk() {
            let Some(key) = node.key() else { continue };
            annotations.set(&key, "level", serde_json::json!(node.level));
            annotations.set(&key, "state", serde_json::json!(node.state));
            annotations.set(&key, "has_children", serde_json::json!(node.has_children));
            if let Some(parent) = &node.parent {
                annotations.set(&key, "parent", serde_json::json!(parent.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_overrides_entries() {
        let key = ModelKey::new("a", 1);
        let mut all = OpenState::All;
        all.close(&key);
        assert!(all.is_open(&key));
        assert!(all.is_open(&ModelKey::new("b", 99)));
    }

    #[test]
    fn test_toggle() {
        let key = ModelKey::new("a", 1);
        let mut open = OpenState::none();
        assert_eq!(open.toggle(key.clone()), NodeState::Expanded);
        assert_eq!(open.toggle(key.clone()), NodeState::Collapsed);
        assert!(!open.is_open(&key));
    }

    #[test]
    fn test_annotate_records_structure() {
        let child = TreeNode {
            model: Model::with_id("b", 10),
            level: 1,
            state: NodeState::Collapsed,
            has_children: false,
            parent: Some(ModelKey::new("a", 1)),
            children: Vec::new(),
        };
        let root = TreeNode {
            model: Model::with_id("a", 1),
            level: 0,
            state: NodeState::Expanded,
            has_children: true,
            parent: None,
            children: vec![ChildGroup {
                entity: "b".to_string(),
                nodes: vec![child],
            }],
        };
        let mut ann = Annotations::new();
        root.annotate(&mut ann);

        let b10 = ModelKey::new("b", 10);
        assert_eq!(ann.get(&b10, "level"), Some(&serde_json::json!(1)));
        assert_eq!(ann.get(&b10, "parent"), Some(&serde_json::json!("a:1")));
        assert_eq!(
            ann.get(&ModelKey::new("a", 1), "state"),
            Some(&serde_json::json!("expanded"))
        );
        assert_eq!(root.child_models("b").len(), 1);
        assert_eq!(root.walk().len(), 2);
    }
}
