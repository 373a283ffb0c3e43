use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{DataProvider, ProviderResult};
use crate::config::{Config, Direction};
use crate::errors::{RtError, RtErrorKind};
use crate::filter::{compile_order_by, compile_where, validate_identifier};
use crate::model::{Collection, Model, RecordId, Value};

type Row = BTreeMap<String, Value>;
type Tables = BTreeMap<String, BTreeMap<RecordId, Row>>;

/// In-memory provider with the same filter, ordering and paging semantics
/// as the SQLite store
///
/// Integer ids are assigned as `max + 1` per entity. Every read is counted
/// so callers can assert on store round trips.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    tables: Tables,
    savepoints: Vec<Tables>,
    reads: Cell<usize>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a row as-is, bypassing id generation
    pub fn insert(&mut self, model: Model) {
        let entity = model.entity().to_string();
        let Some(id) = model.id().cloned() else {
            return;
        };
        self.tables
            .entry(entity)
            .or_default()
            .insert(id, model.into_properties());
    }

    /// Direct row lookup, not counted as a read
    pub fn get(&self, entity: &str, id: &RecordId) -> Option<Model> {
        let row = self.tables.get(entity)?.get(id)?;
        Some(materialize(entity, id, row))
    }

    /// Reads (`fetch_all` and `count` calls) since creation or the last reset
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn reset_reads(&self) {
        self.reads.set(0);
    }

    fn matching(&self, entity: &str, config: &Config) -> ProviderResult<Vec<Model>> {
        validate_identifier(entity).map_err(|e| RtError::from(e).with_entity(entity))?;
        let filter = if config.selects_nothing() {
            config.filter.clone()
        } else {
            config.effective_filter()
        };
        // Compile only to reject what the store would reject
        if let Some(f) = &filter {
            compile_where(f).map_err(|e| RtError::from(e).with_entity(entity))?;
        }
        compile_order_by(&config.sort).map_err(|e| RtError::from(e).with_entity(entity))?;
        if config.selects_nothing() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        if let Some(table) = self.tables.get(entity) {
            for (id, row) in table {
                let model = materialize(entity, id, row);
                let keep = match &filter {
                    Some(f) => f.matches(&model).map_err(RtError::from)?,
                    None => true,
                };
                if keep {
                    rows.push(model);
                }
            }
        }
        Ok(rows)
    }
}

fn materialize(entity: &str, id: &RecordId, row: &Row) -> Model {
    row.iter().fold(Model::with_id(entity, id.clone()), |m, (k, v)| {
        m.with(k.clone(), v.clone())
    })
}

fn project(model: Model, fields: &[String]) -> Model {
    let (false, Some(id)) = (fields.is_empty(), model.id().cloned()) else {
        return model;
    };
    let mut out = Model::with_id(model.entity(), id);
    for field in fields {
        if let Some(value) = model.properties().get(field) {
            out.set(field.clone(), value.clone());
        }
    }
    out
}

impl DataProvider for MemoryProvider {
    fn fetch_all(&self, entity: &str, config: &Config) -> ProviderResult<Collection> {
        self.reads.set(self.reads.get() + 1);
        let mut rows = self.matching(entity, config)?;

        rows.sort_by(|a, b| {
            config
                .sort
                .iter()
                .map(|key| {
                    let ord = a.value(&key.property).store_cmp(&b.value(&key.property));
                    match key.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let take = if config.amount == 0 {
            usize::MAX
        } else {
            config.amount
        };
        let projection = config.projection();
        let page: Collection = rows
            .into_iter()
            .skip(config.start)
            .take(take)
            .map(|m| project(m, &projection))
            .collect();

        tracing::debug!(entity, rows = page.len(), "memory fetch_all");
        Ok(page)
    }

    fn count(&self, entity: &str, config: &Config) -> ProviderResult<u64> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.matching(entity, config)?.len() as u64)
    }

    fn save(&mut self, model: &mut Model) -> ProviderResult<()> {
        let entity = model.entity().to_string();
        validate_identifier(&entity).map_err(|e| RtError::from(e).with_entity(&entity))?;
        for property in model.properties().keys() {
            validate_identifier(property).map_err(|e| RtError::from(e).with_entity(&entity))?;
        }

        let table = self.tables.entry(entity.clone()).or_default();
        let id = match model.id() {
            Some(id) => id.clone(),
            None => {
                let next = table
                    .keys()
                    .filter_map(|id| match id {
                        RecordId::Int(i) => Some(*i),
                        RecordId::Text(_) => None,
                    })
                    .max()
                    .unwrap_or(0)
                    + 1;
                let id = RecordId::Int(next);
                model.assign_id(id.clone()).map_err(RtError::from)?;
                id
            }
        };

        let row = table.entry(id).or_default();
        for (k, v) in model.properties() {
            row.insert(k.clone(), v.clone());
        }
        tracing::debug!(entity = %entity, "memory save");
        Ok(())
    }

    fn delete(&mut self, entity: &str, id: &RecordId) -> ProviderResult<()> {
        if let Some(table) = self.tables.get_mut(entity) {
            table.remove(id);
        }
        Ok(())
    }

    fn begin(&mut self) -> ProviderResult<()> {
        self.savepoints.push(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> ProviderResult<()> {
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(no_transaction)
    }

    fn rollback(&mut self) -> ProviderResult<()> {
        let snapshot = self.savepoints.pop().ok_or_else(no_transaction)?;
        self.tables = snapshot;
        Ok(())
    }
}

fn no_transaction() -> RtError {
    RtError::new(RtErrorKind::Internal).with_message("No open transaction")
}
