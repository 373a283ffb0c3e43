use reltree_core::{
    Filter, MemoryProvider, Model, ParentChildCondition, RegistrationMode, RelationshipRegistry,
    RootCondition, Setter, Value,
};

/// Registry for the two-level fixture: `a` roots (`parent_id IS NULL`) and
/// `b` children linked by `b.parent_id = a.id`
#[allow(dead_code)]
pub fn ab_registry() -> RelationshipRegistry {
    let mut registry = RelationshipRegistry::new();
    registry
        .register_root(
            RootCondition::new("a", Filter::eq("parent_id", Value::Null))
                .with_setter(Setter::new("parent_id", Value::Null)),
            RegistrationMode::Replace,
        )
        .unwrap();
    registry
        .register_child(
            ParentChildCondition::foreign_key("a", "b", "parent_id"),
            RegistrationMode::Replace,
        )
        .unwrap();
    registry
}

/// A = {1, 2}; B = {10 -> 1, 11 -> 1, 12 -> 2}, with B11 ordered before B10
#[allow(dead_code)]
pub fn ab_provider() -> MemoryProvider {
    let mut provider = MemoryProvider::new();
    for id in [1, 2] {
        provider.insert(
            Model::with_id("a", id)
                .with("title", format!("A{}", id))
                .with("parent_id", Value::Null),
        );
    }
    for (id, parent, sorting) in [(10, 1, 512), (11, 1, 256), (12, 2, 256)] {
        provider.insert(
            Model::with_id("b", id)
                .with("title", format!("B{}", id))
                .with("parent_id", parent)
                .with("sorting", sorting),
        );
    }
    provider
}
