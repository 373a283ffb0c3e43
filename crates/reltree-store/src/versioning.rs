//! Record version snapshots
//!
//! Each saved version stores the record's properties as JSON together with
//! the author, a 1-based sequence number per record and a timestamp. At most
//! one version per record is active; the partial unique index on
//! `model_versions` enforces this in the store as well.

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use reltree_core::errors::RelTreeError;
use reltree_core::{transaction, Model, RecordId, RtError, Value};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::errors::{from_rusqlite, version_not_found, Result};
use crate::provider::SqliteProvider;
use crate::sql_value::{id_from_sql, id_to_sql};

/// Metadata of one stored version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version_id: i64,
    pub entity: String,
    pub record_id: RecordId,
    pub sequence: i64,
    pub author: String,
    pub created_at: String,
    pub active: bool,
}

pub trait Versioning {
    /// Snapshot the current properties of `model` as its next version
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the model has no identity, `Serialization` or
    /// `Persistence` on store failure.
    fn save_version(&mut self, model: &Model, author: &str) -> Result<VersionInfo>;

    /// Rebuild the record as it was at `sequence`
    ///
    /// # Errors
    ///
    /// `Persistence` or `Serialization` on store failure.
    fn get_version(&self, entity: &str, id: &RecordId, sequence: i64) -> Result<Option<Model>>;

    /// Make `sequence` the single active version of the record
    ///
    /// # Errors
    ///
    /// `NotFound` when the version does not exist.
    fn set_version_active(&mut self, entity: &str, id: &RecordId, sequence: i64) -> Result<()>;

    /// # Errors
    ///
    /// `Persistence` on store failure.
    fn active_version(&self, entity: &str, id: &RecordId) -> Result<Option<VersionInfo>>;

    /// All versions of the record, oldest first
    ///
    /// # Errors
    ///
    /// `Persistence` on store failure.
    fn list_versions(&self, entity: &str, id: &RecordId) -> Result<Vec<VersionInfo>>;
}

const INFO_COLUMNS: &str = "id, source_entity, record_id, sequence, author, created_at, active";

fn read_info(row: &Row<'_>) -> rusqlite::Result<VersionInfo> {
    let record_id = id_from_sql(row.get_ref(2)?).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "record_id".to_string(), rusqlite::types::Type::Null)
    })?;
    Ok(VersionInfo {
        version_id: row.get(0)?,
        entity: row.get(1)?,
        record_id,
        sequence: row.get(3)?,
        author: row.get(4)?,
        created_at: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
    })
}

fn next_sequence(conn: &Connection, entity: &str, id: &RecordId) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sequence), 0) + 1 FROM model_versions
         WHERE source_entity = ?1 AND record_id = ?2",
        rusqlite::params![entity, id_to_sql(id)],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

fn version_exists(conn: &Connection, entity: &str, id: &RecordId, sequence: i64) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM model_versions
         WHERE source_entity = ?1 AND record_id = ?2 AND sequence = ?3",
        rusqlite::params![entity, id_to_sql(id), sequence],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(from_rusqlite)
}

impl Versioning for SqliteProvider<'_> {
    fn save_version(&mut self, model: &Model, author: &str) -> Result<VersionInfo> {
        let id = model.id().cloned().ok_or_else(|| {
            RtError::from(RelTreeError::MissingIdentity {
                entity: model.entity().to_string(),
                op: "save_version".to_string(),
            })
        })?;
        let entity = model.entity().to_string();
        let snapshot = serde_json::to_string(model.properties())?;

        let info = transaction(self, |p| {
            let conn = p.connection();
            let sequence = next_sequence(conn, &entity, &id)?;
            let created_at = chrono::Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO model_versions
                 (source_entity, record_id, sequence, author, created_at, snapshot, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                rusqlite::params![
                    entity,
                    id_to_sql(&id),
                    sequence,
                    author,
                    created_at,
                    snapshot
                ],
            )
            .map_err(|e| from_rusqlite(e).with_op("save_version").with_entity(&entity))?;
            Ok(VersionInfo {
                version_id: conn.last_insert_rowid(),
                entity: entity.clone(),
                record_id: id.clone(),
                sequence,
                author: author.to_string(),
                created_at,
                active: false,
            })
        })?;

        tracing::debug!(
            entity = %info.entity,
            id = %info.record_id,
            sequence = info.sequence,
            "version saved"
        );
        Ok(info)
    }

    fn get_version(&self, entity: &str, id: &RecordId, sequence: i64) -> Result<Option<Model>> {
        let snapshot: Option<String> = self
            .connection()
            .query_row(
                "SELECT snapshot FROM model_versions
                 WHERE source_entity = ?1 AND record_id = ?2 AND sequence = ?3",
                rusqlite::params![entity, id_to_sql(id), sequence],
                |row| row.get(0),
            )
            .optional()
            .map_err(from_rusqlite)?;

        let Some(snapshot) = snapshot else {
            return Ok(None);
        };
        let properties: BTreeMap<String, Value> = serde_json::from_str(&snapshot)?;
        Ok(Some(
            properties
                .into_iter()
                .fold(Model::with_id(entity, id.clone()), |m, (k, v)| m.with(k, v)),
        ))
    }

    fn set_version_active(&mut self, entity: &str, id: &RecordId, sequence: i64) -> Result<()> {
        transaction(self, |p| {
            let conn = p.connection();
            if !version_exists(conn, entity, id, sequence)? {
                return Err(version_not_found(entity, &id.to_string(), sequence));
            }
            // Clear first so the partial unique index never sees two actives
            conn.execute(
                "UPDATE model_versions SET active = 0
                 WHERE source_entity = ?1 AND record_id = ?2 AND active = 1",
                rusqlite::params![entity, id_to_sql(id)],
            )
            .map_err(from_rusqlite)?;
            conn.execute(
                "UPDATE model_versions SET active = 1
                 WHERE source_entity = ?1 AND record_id = ?2 AND sequence = ?3",
                rusqlite::params![entity, id_to_sql(id), sequence],
            )
            .map_err(from_rusqlite)?;
            Ok(())
        })?;
        tracing::debug!(entity, id = %id, sequence, "version activated");
        Ok(())
    }

    fn active_version(&self, entity: &str, id: &RecordId) -> Result<Option<VersionInfo>> {
        let sql = format!(
            "SELECT {} FROM model_versions
             WHERE source_entity = ?1 AND record_id = ?2 AND active = 1",
            INFO_COLUMNS
        );
        self.connection()
            .query_row(&sql, rusqlite::params![entity, id_to_sql(id)], read_info)
            .optional()
            .map_err(from_rusqlite)
    }

    fn list_versions(&self, entity: &str, id: &RecordId) -> Result<Vec<VersionInfo>> {
        let sql = format!(
            "SELECT {} FROM model_versions
             WHERE source_entity = ?1 AND record_id = ?2 ORDER BY sequence",
            INFO_COLUMNS
        );
        let mut stmt = self.connection().prepare(&sql).map_err(from_rusqlite)?;
        let versions = stmt
            .query_map(rusqlite::params![entity, id_to_sql(id)], read_info)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(versions)
    }
}
