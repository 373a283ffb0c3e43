//! Structure commands: create, move and reparent records in a tree.
//!
//! Each command applies the relationship setters, allocates a manual-order
//! key in the target sibling scope and saves, all in one transaction. The
//! caller's model is only updated once everything succeeded.

#![allow(clippy::result_large_err)]

use reltree_core::core_types::RequestContext;
use reltree_core::errors::RelTreeError;
use reltree_core::relationship::{apply_root_setters, apply_setters};
use reltree_core::{
    log_op_end, log_op_error, log_op_start, transaction, Config, DataProvider, Model, ModelKey,
    Params, Placement, PlacementOutcome, RelationshipRegistry, RtError, SiblingScope,
    SortingPositionResolver,
};
use reltree_store::errors::Result;

use super::with_request;

/// Ancestors visited before a reparent gives up looking for a cycle
const MAX_ANCESTOR_DEPTH: usize = 256;

/// Per-request settings shared by the structure commands
#[derive(Debug, Clone, Default)]
pub struct EditContext {
    pub request: RequestContext,
    pub resolver: SortingPositionResolver,
    pub params: Params,
}

impl EditContext {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    pub fn with_resolver(mut self, resolver: SortingPositionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<reltree_core::Value>,
    ) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Insert `child` below `parent`
///
/// With a placement the child gets a fresh key in the parent's sibling
/// scope; without one it is saved as-is.
///
/// ## Errors
///
/// - `InvalidArgument`: `child` already has an identity, or the anchor is
///   not a sibling
/// - `MissingRelationship`: no condition links the two entities
/// - `Persistence`: store failure (nothing is written)
pub fn create_child<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    parent: &Model,
    child: &mut Model,
    placement: Option<&Placement>,
) -> Result<Option<PlacementOutcome>> {
    log_op_start!(
        "create_child",
        entity = child.entity(),
        parent = %display_key(parent),
        request_id = ctx.request.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let outcome = create_child_impl(provider, registry, ctx, parent, child, placement).map_err(|e| {
        let e = with_request(e, &ctx.request);
        log_op_error!(
            "create_child",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "create_child",
        duration_ms = start.elapsed().as_millis() as u64,
        key = %display_key(child)
    );
    Ok(outcome)
}

fn create_child_impl<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    parent: &Model,
    child: &mut Model,
    placement: Option<&Placement>,
) -> Result<Option<PlacementOutcome>> {
    require_new(child, "create_child")?;
    let condition = registry.require_child_condition(parent.entity(), child.entity())?;

    let mut staged = child.clone();
    apply_setters(parent, &mut staged, condition, &ctx.params)?;
    let outcome = match placement {
        Some(placement) => {
            let scope = SiblingScope::children_of(registry, parent, staged.entity(), &ctx.params)?;
            Some(ctx.resolver.place(provider, &scope, &mut staged, placement)?)
        }
        None => {
            provider.save(&mut staged)?;
            None
        }
    };
    *child = staged;
    Ok(outcome)
}

/// Insert `model` as a top-level record
///
/// ## Errors
///
/// As `create_child`, with `MissingRelationship` when the entity has no
/// root condition.
pub fn create_root<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    model: &mut Model,
    placement: Option<&Placement>,
) -> Result<Option<PlacementOutcome>> {
    log_op_start!(
        "create_root",
        entity = model.entity(),
        request_id = ctx.request.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let outcome = create_root_impl(provider, registry, ctx, model, placement).map_err(|e| {
        let e = with_request(e, &ctx.request);
        log_op_error!(
            "create_root",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "create_root",
        duration_ms = start.elapsed().as_millis() as u64,
        key = %display_key(model)
    );
    Ok(outcome)
}

fn create_root_impl<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    model: &mut Model,
    placement: Option<&Placement>,
) -> Result<Option<PlacementOutcome>> {
    require_new(model, "create_root")?;
    let condition = registry.require_root_condition(model.entity())?;

    let mut staged = model.clone();
    apply_root_setters(&mut staged, condition, &ctx.params)?;
    let outcome = match placement {
        Some(placement) => {
            let scope = SiblingScope::root(registry, staged.entity(), &ctx.params)?;
            Some(ctx.resolver.place(provider, &scope, &mut staged, placement)?)
        }
        None => {
            provider.save(&mut staged)?;
            None
        }
    };
    *model = staged;
    Ok(outcome)
}

/// Move a persisted record below `new_parent`, or to the top level when
/// `new_parent` is `None`
///
/// The record is re-keyed in the new scope when a placement is given.
///
/// ## Errors
///
/// - `InvalidArgument`: the record has no identity, or the move would make
///   it its own ancestor
/// - `MissingRelationship`: no condition links the entities
/// - `Persistence`: store failure (nothing is written)
pub fn reparent<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    model: &mut Model,
    new_parent: Option<&Model>,
    placement: Option<&Placement>,
) -> Result<Option<PlacementOutcome>> {
    log_op_start!(
        "reparent",
        key = %display_key(model),
        parent = %new_parent.map(display_key).unwrap_or_else(|| "root".to_string()),
        request_id = ctx.request.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let outcome = reparent_impl(provider, registry, ctx, model, new_parent, placement).map_err(|e| {
        let e = with_request(e, &ctx.request);
        log_op_error!(
            "reparent",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!("reparent", duration_ms = start.elapsed().as_millis() as u64);
    Ok(outcome)
}

fn reparent_impl<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    model: &mut Model,
    new_parent: Option<&Model>,
    placement: Option<&Placement>,
) -> Result<Option<PlacementOutcome>> {
    let key = require_key(model, "reparent")?;

    let mut staged = model.clone();
    let scope = match new_parent {
        Some(parent) => {
            ensure_not_ancestor(provider, registry, &ctx.params, &key, parent)?;
            let condition = registry.require_child_condition(parent.entity(), staged.entity())?;
            apply_setters(parent, &mut staged, condition, &ctx.params)?;
            SiblingScope::children_of(registry, parent, staged.entity(), &ctx.params)?
        }
        None => {
            let condition = registry.require_root_condition(staged.entity())?;
            apply_root_setters(&mut staged, condition, &ctx.params)?;
            SiblingScope::root(registry, staged.entity(), &ctx.params)?
        }
    };

    let outcome = match placement {
        Some(placement) => Some(ctx.resolver.place(provider, &scope, &mut staged, placement)?),
        None => {
            transaction(provider, |p| p.save(&mut staged))?;
            None
        }
    };
    *model = staged;
    Ok(outcome)
}

/// Re-key a record inside its current sibling scope
///
/// `parent` is the record's current parent, `None` for a top-level record.
///
/// ## Errors
///
/// - `InvalidArgument`: no identity, or the anchor is not a sibling
/// - `MissingRelationship`: no condition describes the scope
pub fn move_within<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    model: &mut Model,
    parent: Option<&Model>,
    placement: &Placement,
) -> Result<PlacementOutcome> {
    log_op_start!(
        "move_within",
        key = %display_key(model),
        request_id = ctx.request.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let outcome = move_within_impl(provider, registry, ctx, model, parent, placement).map_err(|e| {
        let e = with_request(e, &ctx.request);
        log_op_error!(
            "move_within",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "move_within",
        duration_ms = start.elapsed().as_millis() as u64,
        sort_key = outcome.key,
        renormalized = outcome.renormalized
    );
    Ok(outcome)
}

fn move_within_impl<P: DataProvider + ?Sized>(
    provider: &mut P,
    registry: &RelationshipRegistry,
    ctx: &EditContext,
    model: &mut Model,
    parent: Option<&Model>,
    placement: &Placement,
) -> Result<PlacementOutcome> {
    require_key(model, "move_within")?;
    let scope = match parent {
        Some(parent) => SiblingScope::children_of(registry, parent, model.entity(), &ctx.params)?,
        None => SiblingScope::root(registry, model.entity(), &ctx.params)?,
    };

    // Only the sort key is written
    let id = model.id().cloned().ok_or_else(|| missing_identity(model, "move_within"))?;
    let mut rekeyed = Model::with_id(model.entity(), id);
    let outcome = ctx.resolver.place(provider, &scope, &mut rekeyed, placement)?;
    model.set(ctx.resolver.property(), outcome.key);
    Ok(outcome)
}

/// The `parent_entity` record `child` hangs below, via the inverse filter
///
/// A child loaded without its link columns is reloaded first.
///
/// ## Errors
///
/// - `MissingRelationship`: no condition links the entities
/// - `InvalidArgument`: no inverse filter can be derived
pub fn find_parent<P: DataProvider + ?Sized>(
    provider: &P,
    registry: &RelationshipRegistry,
    parent_entity: &str,
    child: &Model,
    params: &Params,
) -> Result<Option<Model>> {
    log_op_start!(
        "find_parent",
        parent_entity = parent_entity,
        key = %display_key(child)
    );
    let start = std::time::Instant::now();

    let parent = find_parent_impl(provider, registry, parent_entity, child, params).map_err(|e| {
        log_op_error!(
            "find_parent",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "find_parent",
        duration_ms = start.elapsed().as_millis() as u64,
        found = parent.is_some()
    );
    Ok(parent)
}

fn find_parent_impl<P: DataProvider + ?Sized>(
    provider: &P,
    registry: &RelationshipRegistry,
    parent_entity: &str,
    child: &Model,
    params: &Params,
) -> Result<Option<Model>> {
    let condition = registry.require_child_condition(parent_entity, child.entity())?;
    let link_fields = condition
        .effective_inverse()
        .map(|f| f.referenced_fields())
        .unwrap_or_default();

    let reloaded;
    let child = match child.id() {
        Some(id) if link_fields.iter().any(|f| child.get(f).is_none()) => {
            match provider.fetch(child.entity(), &Config::by_id(id.clone()))? {
                Some(full) => {
                    reloaded = full;
                    &reloaded
                }
                None => return Ok(None),
            }
        }
        _ => child,
    };

    let filter = registry.compute_parent_filter(parent_entity, child, params)?;
    provider.fetch(parent_entity, &Config::new().with_filter(filter))
}

/// Reject a move of `moving` below itself or one of its descendants
fn ensure_not_ancestor<P: DataProvider + ?Sized>(
    provider: &P,
    registry: &RelationshipRegistry,
    params: &Params,
    moving: &ModelKey,
    new_parent: &Model,
) -> Result<()> {
    let mut current = new_parent.clone();
    for _ in 0..MAX_ANCESTOR_DEPTH {
        if current.key().as_ref() == Some(moving) {
            return Err(RelTreeError::InvalidArgument {
                reason: format!(
                    "moving {} below {} would create a cycle",
                    moving,
                    display_key(new_parent)
                ),
            }
            .into());
        }
        let mut next = None;
        for condition in registry.parent_conditions(current.entity()) {
            if condition.effective_inverse().is_none() {
                continue;
            }
            let parent = find_parent_impl(
                provider,
                registry,
                &condition.parent_entity,
                &current,
                params,
            )?;
            if let Some(parent) = parent {
                next = Some(parent);
                break;
            }
        }
        match next {
            Some(parent) => current = parent,
            None => return Ok(()),
        }
    }
    tracing::debug!(key = %moving, "ancestor walk hit depth limit");
    Ok(())
}

fn require_new(model: &Model, op: &str) -> Result<()> {
    match model.id() {
        Some(id) => Err(RelTreeError::InvalidArgument {
            reason: format!("{} expects a new {} record, got id {}", op, model.entity(), id),
        }
        .into()),
        None => Ok(()),
    }
}

fn require_key(model: &Model, op: &str) -> Result<ModelKey> {
    model.key().ok_or_else(|| missing_identity(model, op))
}

fn missing_identity(model: &Model, op: &str) -> RtError {
    RelTreeError::MissingIdentity {
        entity: model.entity().to_string(),
        op: op.to_string(),
    }
    .into()
}

fn display_key(model: &Model) -> String {
    match model.key() {
        Some(key) => key.to_string(),
        None => format!("{}:new", model.entity()),
    }
}
