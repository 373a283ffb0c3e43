//! Version commands.

#![allow(clippy::result_large_err)]

use reltree_core::core_types::RequestContext;
use reltree_core::{
    log_op_end, log_op_error, log_op_start, transaction, DataProvider, Model, RecordId,
};
use reltree_store::errors::{version_not_found, Result};
use reltree_store::{SqliteProvider, VersionInfo, Versioning};

use super::with_request;

/// Snapshot `model` as its next version, authored by the request
///
/// ## Errors
///
/// - `InvalidArgument`: the model has no identity
/// - `Persistence`: store failure
pub fn version_save(
    provider: &mut SqliteProvider<'_>,
    ctx: &RequestContext,
    model: &Model,
) -> Result<VersionInfo> {
    log_op_start!(
        "version_save",
        entity = model.entity(),
        request_id = ctx.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let info = provider
        .save_version(model, ctx.author_or_system())
        .map_err(|e| {
            let e = with_request(e, ctx);
            log_op_error!(
                "version_save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

    log_op_end!(
        "version_save",
        duration_ms = start.elapsed().as_millis() as u64,
        sequence = info.sequence
    );
    Ok(info)
}

/// Write version `sequence` back to the record and make it the active one
///
/// ## Errors
///
/// - `NotFound`: no such version
/// - `Persistence`: store failure (nothing is written)
pub fn version_restore(
    provider: &mut SqliteProvider<'_>,
    ctx: &RequestContext,
    entity: &str,
    id: &RecordId,
    sequence: i64,
) -> Result<Model> {
    log_op_start!(
        "version_restore",
        entity = entity,
        sequence = sequence,
        request_id = ctx.request_id.as_str()
    );
    let start = std::time::Instant::now();

    let restored = transaction(provider, |p| {
        let mut model = p
            .get_version(entity, id, sequence)?
            .ok_or_else(|| version_not_found(entity, &id.to_string(), sequence))?;
        p.save(&mut model)?;
        p.set_version_active(entity, id, sequence)?;
        Ok(model)
    })
    .map_err(|e| {
        let e = with_request(e, ctx);
        log_op_error!(
            "version_restore",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!("version_restore", duration_ms = start.elapsed().as_millis() as u64);
    Ok(restored)
}
