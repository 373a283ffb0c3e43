//! Store settings loaded from TOML
//!
//! ```toml
//! [database]
//! path = "tree.db"
//!
//! [sorting]
//! gap = 256
//! property = "sorting"
//!
//! [entities.pages]
//! id_generator = "uuid"
//! created_column = "created_at"
//! updated_column = "updated_at"
//! ```

#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reltree_core::filter::validate_identifier;
use reltree_core::sorting::{SortingPositionResolver, DEFAULT_GAP, MIN_ROOM};
use reltree_core::tree::DEFAULT_SORT_PROPERTY;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::errors::{io_error, settings_error, Result};

/// How new identities are produced on insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdGenerator {
    /// Let SQLite assign the next rowid
    #[default]
    Store,
    /// Time-ordered UUIDv7 text keys
    Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySettings {
    pub id_generator: IdGenerator,
    /// Column stamped with the insert time
    pub created_column: Option<String>,
    /// Column stamped on every save
    pub updated_column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// File path; `None` opens an in-memory database
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingSettings {
    pub gap: i64,
    pub property: String,
}

impl Default for SortingSettings {
    fn default() -> Self {
        Self {
            gap: DEFAULT_GAP,
            property: DEFAULT_SORT_PROPERTY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub sorting: SortingSettings,
    pub entities: BTreeMap<String, EntitySettings>,
}

impl Settings {
    /// Parse and validate settings
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for malformed TOML, a gap too small to subdivide,
    /// or a column/entity name that is not a plain identifier.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| settings_error(format!("Invalid TOML: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, otherwise as `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| io_error("settings", e))?;
        Self::from_toml_str(&text)
    }

    /// Settings for `entity`, falling back to defaults
    pub fn entity(&self, entity: &str) -> EntitySettings {
        self.entities.get(entity).cloned().unwrap_or_default()
    }

    pub fn with_entity(mut self, entity: impl Into<String>, settings: EntitySettings) -> Self {
        self.entities.insert(entity.into(), settings);
        self
    }

    pub fn resolver(&self) -> SortingPositionResolver {
        SortingPositionResolver::new(self.sorting.gap, self.sorting.property.clone())
    }

    /// Open the configured database, ready for use
    ///
    /// # Errors
    ///
    /// `Persistence` when the database cannot be opened or migrated.
    pub fn open_database(&self) -> Result<Connection> {
        match &self.database.path {
            Some(path) => db::open_ready(path),
            None => db::open_ready_in_memory(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sorting.gap <= MIN_ROOM {
            return Err(settings_error(format!(
                "sorting.gap must be greater than {}, got {}",
                MIN_ROOM, self.sorting.gap
            )));
        }
        check_name(&self.sorting.property)?;
        for (entity, entity_settings) in &self.entities {
            check_name(entity)?;
            for column in [&entity_settings.created_column, &entity_settings.updated_column]
                .into_iter()
                .flatten()
            {
                check_name(column)?;
            }
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    validate_identifier(name)
        .map(|_| ())
        .map_err(|e| settings_error(e.to_string()))
}
