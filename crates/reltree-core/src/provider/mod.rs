//! Data provider interface
//!
//! A `DataProvider` executes a `Config` against one backing store. The
//! SQLite implementation lives in `reltree-store`; `MemoryProvider` here
//! evaluates filters in memory and backs the core tests.
//!
//! Transactions nest: a `begin` inside an open transaction opens a
//! savepoint, so operations that are atomic on their own can be composed
//! into larger atomic commands.

#![allow(clippy::result_large_err)]

mod memory;

pub use memory::MemoryProvider;

use crate::config::Config;
use crate::errors::{RelTreeError, RtError};
use crate::filter::Filter;
use crate::model::{Collection, Model, RecordId, Value};

/// Result type for provider operations
pub type ProviderResult<T> = std::result::Result<T, RtError>;

pub trait DataProvider {
    /// First matching record, or `None`
    ///
    /// With an explicit id this is a key lookup and the paging offset is
    /// ignored; otherwise `start` still skips rows.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` / `InvalidArgument` for a malformed request,
    /// `Persistence` for a store failure.
    fn fetch(&self, entity: &str, config: &Config) -> ProviderResult<Option<Model>> {
        let single = match config.id {
            Some(_) => config.clone().page(1, 0),
            None => config.clone().limit(1),
        };
        Ok(self.fetch_all(entity, &single)?.into_vec().into_iter().next())
    }

    /// All matching records after sorting and paging; never fails for
    /// "nothing found"
    ///
    /// # Errors
    ///
    /// As `fetch`.
    fn fetch_all(&self, entity: &str, config: &Config) -> ProviderResult<Collection>;

    /// Identities of the matching records
    ///
    /// # Errors
    ///
    /// As `fetch`.
    fn fetch_ids(&self, entity: &str, config: &Config) -> ProviderResult<Vec<RecordId>> {
        let ids_only = config.clone().ids_only();
        Ok(self.fetch_all(entity, &ids_only)?.ids())
    }

    /// Number of matching records, ignoring paging
    ///
    /// # Errors
    ///
    /// As `fetch`.
    fn count(&self, entity: &str, config: &Config) -> ProviderResult<u64>;

    /// True if at least one record matches
    ///
    /// # Errors
    ///
    /// As `fetch`.
    fn exists(&self, entity: &str, config: &Config) -> ProviderResult<bool> {
        let first = config.clone().page(1, 0);
        Ok(!self.fetch_ids(entity, &first)?.is_empty())
    }

    /// Insert (no identity) or update (identity present) in place
    ///
    /// An insert assigns the identity to `model`. An update of an id with no
    /// row inserts the row under that id.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a bad entity/property name, `Persistence` for a
    /// store failure.
    fn save(&mut self, model: &mut Model) -> ProviderResult<()>;

    /// Delete by key; absent rows are not an error
    ///
    /// # Errors
    ///
    /// `Persistence` for a store failure.
    fn delete(&mut self, entity: &str, id: &RecordId) -> ProviderResult<()>;

    /// # Errors
    ///
    /// `InvalidArgument` when the model has no identity.
    fn delete_model(&mut self, model: &Model) -> ProviderResult<()> {
        let id = model.id().ok_or_else(|| {
            RtError::from(RelTreeError::MissingIdentity {
                entity: model.entity().to_string(),
                op: "delete".to_string(),
            })
        })?;
        self.delete(model.entity(), id)
    }

    /// True if no record other than `exclude_id` holds `value` in `property`
    ///
    /// # Errors
    ///
    /// As `fetch`.
    fn is_unique_value(
        &self,
        entity: &str,
        property: &str,
        value: &Value,
        exclude_id: Option<&RecordId>,
    ) -> ProviderResult<bool> {
        let holders_cfg = Config::new()
            .with_filter(Filter::eq(property, value.clone()))
            .page(2, 0);
        let holders = self.fetch_ids(entity, &holders_cfg)?;
        Ok(holders.iter().all(|id| Some(id) == exclude_id))
    }

    /// # Errors
    ///
    /// `Persistence` when the store refuses to open a transaction.
    fn begin(&mut self) -> ProviderResult<()>;

    /// # Errors
    ///
    /// `Persistence` when the commit fails, `Internal` with no open
    /// transaction.
    fn commit(&mut self) -> ProviderResult<()>;

    /// # Errors
    ///
    /// `Persistence` when the rollback fails, `Internal` with no open
    /// transaction.
    fn rollback(&mut self) -> ProviderResult<()>;
}

/// Run `f` atomically: commit on `Ok`, roll back on `Err`
///
/// # Errors
///
/// The closure's error, or a transaction control failure.
pub fn transaction<P, T, F>(provider: &mut P, f: F) -> ProviderResult<T>
where
    P: DataProvider + ?Sized,
    F: FnOnce(&mut P) -> ProviderResult<T>,
{
    provider.begin()?;
    match f(provider) {
        Ok(value) => {
            provider.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = provider.rollback() {
                tracing::debug!(error = %rollback_err, "rollback after failure also failed");
            }
            Err(err)
        }
    }
}
