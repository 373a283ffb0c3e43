#![allow(clippy::result_large_err)]

use super::node::{ChildGroup, NodeState, OpenState, TreeNode};
use super::options::TreeOptions;
use crate::config::Config;
use crate::errors::{RelTreeError, RtError};
use crate::filter::Filter;
use crate::model::{Collection, Model, ModelKey};
use crate::provider::{DataProvider, ProviderResult};
use crate::relationship::RelationshipRegistry;

/// Depth-first materializer for tree views
///
/// Reads only. Expanded nodes cost one fetch per declared child entity;
/// collapsed nodes cost at most one existence check per child entity and
/// stop at the first hit.
pub struct TreeBuilder<'a, P: DataProvider + ?Sized> {
    provider: &'a P,
    registry: &'a RelationshipRegistry,
    open: &'a OpenState,
    options: &'a TreeOptions,
}

impl<'a, P: DataProvider + ?Sized> TreeBuilder<'a, P> {
    pub fn new(
        provider: &'a P,
        registry: &'a RelationshipRegistry,
        open: &'a OpenState,
        options: &'a TreeOptions,
    ) -> Self {
        Self {
            provider,
            registry,
            open,
            options,
        }
    }

    /// Top-level records of `entity` as level-0 nodes
    ///
    /// # Errors
    ///
    /// `MissingRelationship` without a root condition, otherwise any
    /// provider or resolution error.
    pub fn build_roots(&self, entity: &str) -> ProviderResult<Vec<TreeNode>> {
        self.build_roots_with(entity, &Config::new())
    }

    /// Like `build_roots`, with an extra filter, sort or page from `extra`
    ///
    /// # Errors
    ///
    /// As `build_roots`.
    pub fn build_roots_with(&self, entity: &str, extra: &Config) -> ProviderResult<Vec<TreeNode>> {
        let root_filter = self
            .registry
            .compute_root_filter(entity, &self.options.params)
            .map_err(|e| RtError::from(e).with_entity(entity))?;
        let mut config = self.child_config(entity, root_filter);
        if let Some(filter) = &extra.filter {
            config = config.and_filter(filter.clone());
        }
        if !extra.sort.is_empty() {
            config.sort = extra.sort.clone();
        }
        config.amount = extra.amount;
        config.start = extra.start;

        let roots = self.provider.fetch_all(entity, &config)?;
        tracing::debug!(entity, roots = roots.len(), "tree roots fetched");
        self.build_from(&roots, 0, None)
    }

    /// Materialize every record of `collection` at `level`
    ///
    /// # Errors
    ///
    /// Any provider or resolution error.
    pub fn build_from(
        &self,
        collection: &Collection,
        level: usize,
        parent: Option<&ModelKey>,
    ) -> ProviderResult<Vec<TreeNode>> {
        let mut path = Vec::new();
        collection
            .iter()
            .map(|model| self.expand_on_path(model.clone(), level, parent.cloned(), &mut path))
            .collect()
    }

    /// Materialize one record and, if open, its subtree
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an identity-less record, otherwise any
    /// provider or resolution error.
    pub fn expand(
        &self,
        model: Model,
        level: usize,
        parent: Option<&ModelKey>,
    ) -> ProviderResult<TreeNode> {
        self.expand_on_path(model, level, parent.cloned(), &mut Vec::new())
    }

    fn expand_on_path(
        &self,
        model: Model,
        level: usize,
        parent: Option<ModelKey>,
        path: &mut Vec<ModelKey>,
    ) -> ProviderResult<TreeNode> {
        let key = model.key().ok_or_else(|| {
            RtError::from(RelTreeError::MissingIdentity {
                entity: model.entity().to_string(),
                op: "expand".to_string(),
            })
        })?;
        let entity = model.entity().to_string();
        let conditions = self.registry.child_conditions(&entity);

        let revisited = path.contains(&key);
        if revisited {
            tracing::debug!(node = %key, "node already on ancestor path, not expanding");
        }
        let state = if revisited {
            NodeState::Collapsed
        } else {
            self.open.state_of(&key)
        };

        let mut node = TreeNode {
            model,
            level,
            state,
            has_children: false,
            parent,
            children: Vec::new(),
        };
        if conditions.is_empty() {
            return Ok(node);
        }

        match state {
            NodeState::Collapsed => {
                for condition in conditions {
                    let filter = self.child_filter(&node.model, &condition.child_entity)?;
                    let any_child = Config::new().with_filter(filter);
                    if self.provider.exists(&condition.child_entity, &any_child)? {
                        node.has_children = true;
                        break;
                    }
                }
            }
            NodeState::Expanded => {
                path.push(key.clone());
                for condition in conditions {
                    let child_entity = condition.child_entity.as_str();
                    let filter = self.child_filter(&node.model, child_entity)?;
                    let config = self.child_config(child_entity, filter);
                    let children = self.provider.fetch_all(child_entity, &config)?;
                    tracing::debug!(
                        node = %key,
                        child_entity,
                        children = children.len(),
                        "tree children fetched"
                    );

                    let mut nodes = Vec::with_capacity(children.len());
                    for child in children {
                        nodes.push(self.expand_on_path(child, level + 1, Some(key.clone()), path)?);
                    }
                    node.has_children |= !nodes.is_empty();
                    node.children.push(ChildGroup {
                        entity: child_entity.to_string(),
                        nodes,
                    });
                }
                path.pop();
            }
        }
        Ok(node)
    }

    fn child_filter(&self, parent: &Model, child_entity: &str) -> ProviderResult<Filter> {
        self.registry
            .compute_child_filter(parent.entity(), child_entity, parent, &self.options.params)
            .map_err(|e| RtError::from(e).with_entity(child_entity))
    }

    fn child_config(&self, entity: &str, filter: Filter) -> Config {
        let mut config = Config::new()
            .with_filter(filter)
            .fields(self.options.projection_for(entity, self.registry));
        config.sort = self.options.order_for(entity);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operand;
    use crate::model::{RecordId, Value};
    use crate::provider::MemoryProvider;
    use crate::relationship::{ParentChildCondition, RegistrationMode, RootCondition};

    fn registry() -> RelationshipRegistry {
        let mut reg = RelationshipRegistry::new();
        reg.register_root(
            RootCondition::new("a", Filter::eq("parent_id", Value::Null)),
            RegistrationMode::Replace,
        )
        .unwrap();
        reg.register_child(
            ParentChildCondition::foreign_key("a", "b", "parent_id"),
            RegistrationMode::Replace,
        )
        .unwrap();
        reg
    }

    fn provider() -> MemoryProvider {
        let mut p = MemoryProvider::new();
        p.insert(Model::with_id("a", 1).with("parent_id", Value::Null));
        p.insert(Model::with_id("a", 2).with("parent_id", Value::Null));
        for (id, parent, sorting) in [(10, 1, 512), (11, 1, 256), (12, 2, 256)] {
            p.insert(
                Model::with_id("b", id)
                    .with("parent_id", parent)
                    .with("sorting", sorting),
            );
        }
        p
    }

    #[test]
    fn test_collapsed_roots_only_check_children_exist() {
        let p = provider();
        let reg = registry();
        let open = OpenState::none();
        let opts = TreeOptions::new().with_sorting("b");
        let roots = TreeBuilder::new(&p, &reg, &open, &opts)
            .build_roots("a")
            .unwrap();

        assert_eq!(roots.len(), 2);
        for root in &roots {
            assert!(root.has_children);
            assert_eq!(root.state, NodeState::Collapsed);
            assert!(root.children.is_empty());
        }
    }

    #[test]
    fn test_open_root_attaches_children_in_manual_order() {
        let p = provider();
        let reg = registry();
        let open = OpenState::keys([ModelKey::new("a", 1)]);
        let opts = TreeOptions::new().with_sorting("b");
        let roots = TreeBuilder::new(&p, &reg, &open, &opts)
            .build_roots("a")
            .unwrap();

        let children = roots[0].child_models("b");
        assert_eq!(children.ids(), vec![RecordId::Int(11), RecordId::Int(10)]);
        let group = roots[0].child_group("b").unwrap();
        assert!(group.nodes.iter().all(|n| n.level == 1));
        assert!(group
            .nodes
            .iter()
            .all(|n| n.parent == Some(ModelKey::new("a", 1))));
        assert!(roots[1].children.is_empty());
    }

    #[test]
    fn test_round_trips_bounded() {
        let p = provider();
        let reg = registry();
        let open = OpenState::All;
        let opts = TreeOptions::new();
        p.reset_reads();
        TreeBuilder::new(&p, &reg, &open, &opts)
            .build_roots("a")
            .unwrap();
        // one root fetch + one child fetch per expanded root; b is a leaf
        assert_eq!(p.reads(), 3);
    }

    #[test]
    fn test_self_referencing_cycle_stops() {
        let mut reg = RelationshipRegistry::new();
        reg.register_child(
            ParentChildCondition::new("n", "n", Filter::eq("id", Operand::field("next_id"))),
            RegistrationMode::Replace,
        )
        .unwrap();
        let mut p = MemoryProvider::new();
        p.insert(Model::with_id("n", 1).with("next_id", 2));
        p.insert(Model::with_id("n", 2).with("next_id", 1));

        let open = OpenState::All;
        let opts = TreeOptions::new();
        let node = TreeBuilder::new(&p, &reg, &open, &opts)
            .expand(Model::with_id("n", 1).with("next_id", 2), 0, None)
            .unwrap();

        let second = &node.child_group("n").unwrap().nodes[0];
        let third = &second.child_group("n").unwrap().nodes[0];
        assert_eq!(third.key(), Some(ModelKey::new("n", 1)));
        assert_eq!(third.state, NodeState::Collapsed);
        assert!(third.has_children);
        assert!(third.children.is_empty());
    }

    #[test]
    fn test_missing_root_condition() {
        let p = provider();
        let reg = RelationshipRegistry::new();
        let open = OpenState::none();
        let opts = TreeOptions::new();
        let err = TreeBuilder::new(&p, &reg, &open, &opts)
            .build_roots("a")
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::RtErrorKind::MissingRelationship);
    }
}
