//! Ledger check and application of pending migrations

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;

use rusqlite::Connection;

use super::embedded::{Migration, MIGRATIONS};
use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};

/// Bring the side tables up to date
///
/// The whole ledger is checked before anything runs: an applied migration
/// whose SQL changed, or one this build does not know, fails the call and
/// leaves the database untouched. Pending migrations then run in a single
/// transaction.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT
        )",
    )
    .map_err(from_rusqlite)?;

    let ledger = read_ledger(conn)?;
    let pending = pending_migrations(&ledger)?;
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;
    let applied_at = chrono::Utc::now().timestamp();
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .map_err(|e| migration_error(migration.id, &e.to_string()))?;
        tx.execute(
            "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.id, applied_at, migration.checksum()],
        )
        .map_err(from_rusqlite)?;
        tracing::debug!(migration_id = migration.id, "migration applied");
    }
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(applied = pending.len(), "schema up to date");
    Ok(())
}

/// Ids of the migrations recorded as applied, in application order
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT migration_id FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(from_rusqlite)?;
    Ok(ids)
}

/// migration_id -> recorded checksum (NULL for rows written without one)
fn read_ledger(conn: &Connection) -> Result<BTreeMap<String, Option<String>>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, checksum FROM schema_version")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

fn pending_migrations(
    ledger: &BTreeMap<String, Option<String>>,
) -> Result<Vec<&'static Migration>> {
    if let Some(unknown) = ledger
        .keys()
        .find(|id| !MIGRATIONS.iter().any(|m| m.id == id.as_str()))
    {
        return Err(migration_error(
            unknown,
            "recorded in schema_version but unknown to this build",
        ));
    }

    let mut pending = Vec::new();
    for migration in MIGRATIONS {
        match ledger.get(migration.id) {
            None => pending.push(migration),
            Some(Some(recorded)) => {
                let actual = migration.checksum();
                if *recorded != actual {
                    return Err(checksum_mismatch(migration.id, recorded, &actual));
                }
            }
            Some(None) => {}
        }
    }
    Ok(pending)
}
