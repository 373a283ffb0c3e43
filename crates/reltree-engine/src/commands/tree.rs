//! Tree load commands.

#![allow(clippy::result_large_err)]

use reltree_core::core_types::RequestContext;
use reltree_core::{
    log_op_end, log_op_error, log_op_start, Config, DataProvider, OpenState, RelationshipRegistry,
    TreeBuilder, TreeNode, TreeOptions,
};
use reltree_store::errors::Result;
use reltree_store::{open_state, SqliteProvider};

use super::with_request;

/// One tree view to materialize
#[derive(Debug, Clone)]
pub struct TreeRequest {
    /// Entity of the top-level records
    pub entity: String,
    /// Open nodes; `None` means "use the persisted state of the request
    /// scope" for `load_scoped_tree`, and "all collapsed" elsewhere
    pub open: Option<OpenState>,
    pub options: TreeOptions,
    /// Extra filter, sort and paging applied to the root fetch
    pub root: Option<Config>,
    pub context: RequestContext,
}

impl TreeRequest {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            open: None,
            options: TreeOptions::new(),
            root: None,
            context: RequestContext::new(),
        }
    }

    pub fn with_open(mut self, open: OpenState) -> Self {
        self.open = Some(open);
        self
    }

    pub fn with_options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_root(mut self, root: Config) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Materialize the tree described by `request`
///
/// ## Errors
///
/// - `MissingRelationship`: the root entity has no root condition
/// - `InvalidFilter` / `InvalidArgument`: malformed root config
/// - `Persistence`: store failure
pub fn load_tree<P: DataProvider + ?Sized>(
    provider: &P,
    registry: &RelationshipRegistry,
    request: &TreeRequest,
) -> Result<Vec<TreeNode>> {
    let open = request.open.clone().unwrap_or_default();
    load_tree_logged(provider, registry, request, &open)
}

/// Like `load_tree`, reading the open nodes of the request scope from the
/// store when the request carries none
///
/// ## Errors
///
/// As `load_tree`.
pub fn load_scoped_tree(
    provider: &SqliteProvider<'_>,
    registry: &RelationshipRegistry,
    request: &TreeRequest,
) -> Result<Vec<TreeNode>> {
    let open = match (&request.open, &request.context.scope) {
        (Some(open), _) => open.clone(),
        (None, Some(scope)) => open_state::load_open_state(provider.connection(), scope)
            .map_err(|e| with_request(e, &request.context))?,
        (None, None) => OpenState::none(),
    };
    load_tree_logged(provider, registry, request, &open)
}

fn load_tree_logged<P: DataProvider + ?Sized>(
    provider: &P,
    registry: &RelationshipRegistry,
    request: &TreeRequest,
    open: &OpenState,
) -> Result<Vec<TreeNode>> {
    log_op_start!(
        "load_tree",
        entity = request.entity.as_str(),
        request_id = request.context.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let builder = TreeBuilder::new(provider, registry, open, &request.options);
    let result = match &request.root {
        Some(root) => builder.build_roots_with(&request.entity, root),
        None => builder.build_roots(&request.entity),
    };
    let roots = result.map_err(|e| {
        let e = with_request(e, &request.context);
        log_op_error!(
            "load_tree",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            entity = request.entity.as_str()
        );
        e
    })?;

    let nodes: usize = roots.iter().map(|r| r.walk().len()).sum();
    log_op_end!(
        "load_tree",
        duration_ms = start.elapsed().as_millis() as u64,
        roots = roots.len() as u64,
        nodes = nodes as u64
    );
    Ok(roots)
}
