//! SQLite data provider
//!
//! One table per entity, keyed by an `id` primary key. Filters and sort
//! keys are compiled by `reltree_core::filter`; every value is bound as a
//! parameter, and entity/column names are validated identifiers.

#![allow(clippy::result_large_err)]

use reltree_core::filter::{compile_order_by, compile_where, validate_identifier};
use reltree_core::model::ID_PROPERTY;
use reltree_core::{Collection, Config, DataProvider, Model, ProviderResult, RecordId, RtError};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use crate::errors::from_rusqlite;
use crate::settings::{EntitySettings, IdGenerator, Settings};
use crate::sql_value::{from_sql, id_from_sql, id_to_sql, to_sql};

/// `DataProvider` over a borrowed SQLite connection
///
/// Transactions nest: the outermost `begin` issues `BEGIN IMMEDIATE`, inner
/// ones open savepoints.
pub struct SqliteProvider<'c> {
    conn: &'c Connection,
    settings: Settings,
    depth: usize,
}

impl<'c> SqliteProvider<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_settings(conn, Settings::default())
    }

    pub fn with_settings(conn: &'c Connection, settings: Settings) -> Self {
        Self {
            conn,
            settings,
            depth: 0,
        }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Open transaction/savepoint depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn where_clause(
        &self,
        entity: &str,
        config: &Config,
    ) -> ProviderResult<(String, Vec<SqlValue>)> {
        if config.selects_nothing() {
            if let Some(filter) = &config.filter {
                compile_where(filter).map_err(|e| RtError::from(e).with_entity(entity))?;
            }
            return Ok((" WHERE 1 = 0".to_string(), Vec::new()));
        }
        match config.effective_filter() {
            Some(filter) => {
                let (sql, params) =
                    compile_where(&filter).map_err(|e| RtError::from(e).with_entity(entity))?;
                Ok((
                    format!(" WHERE {}", sql),
                    params.iter().map(to_sql).collect(),
                ))
            }
            None => Ok((String::new(), Vec::new())),
        }
    }

    fn insert(
        &self,
        model: &mut Model,
        settings: &EntitySettings,
        now: &str,
    ) -> ProviderResult<()> {
        let entity = model.entity().to_string();
        if let Some(column) = &settings.created_column {
            if model.get(column).is_none() {
                model.set(column.clone(), now);
            }
        }

        let generated = match settings.id_generator {
            IdGenerator::Uuid => Some(RecordId::Text(uuid::Uuid::now_v7().to_string())),
            IdGenerator::Store => None,
        };

        let mut columns = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = &generated {
            columns.push(ID_PROPERTY.to_string());
            values.push(id_to_sql(id));
        }
        for (column, value) in model.properties() {
            columns.push(column.clone());
            values.push(to_sql(value));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", entity)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                entity,
                columns.join(", "),
                placeholders(columns.len())
            )
        };
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| from_rusqlite(e).with_op("save").with_entity(&entity))?;

        let id = generated.unwrap_or_else(|| RecordId::Int(self.conn.last_insert_rowid()));
        tracing::debug!(entity = %entity, id = %id, "sqlite insert");
        model.assign_id(id).map_err(RtError::from)
    }

    /// Update by id, inserting under that id when the row is missing
    ///
    /// Only the model's own properties are written, so partial models (a
    /// bare sort key) leave the other columns alone.
    fn update(
        &self,
        model: &Model,
        id: &RecordId,
        settings: &EntitySettings,
        now: &str,
    ) -> ProviderResult<()> {
        let entity = model.entity();
        let fail = |e: rusqlite::Error| {
            from_rusqlite(e)
                .with_op("save")
                .with_entity(entity)
                .with_record_id(id.to_string())
        };

        let found = if model.properties().is_empty() {
            let sql = format!("SELECT 1 FROM {} WHERE {} = ?", entity, ID_PROPERTY);
            self.conn
                .query_row(&sql, [id_to_sql(id)], |_| Ok(()))
                .optional()
                .map_err(fail)?
                .is_some()
        } else {
            let assignments: Vec<String> = model
                .properties()
                .keys()
                .map(|column| format!("{} = ?", column))
                .collect();
            let mut values: Vec<SqlValue> = model.properties().values().map(to_sql).collect();
            values.push(id_to_sql(id));
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                entity,
                assignments.join(", "),
                ID_PROPERTY
            );
            self.conn
                .execute(&sql, params_from_iter(values.iter()))
                .map_err(fail)?
                > 0
        };
        if found {
            tracing::debug!(entity, id = %id, "sqlite update");
            return Ok(());
        }

        let mut columns = vec![ID_PROPERTY.to_string()];
        let mut values = vec![id_to_sql(id)];
        for (column, value) in model.properties() {
            columns.push(column.clone());
            values.push(to_sql(value));
        }
        if let Some(column) = &settings.created_column {
            if model.get(column).is_none() {
                columns.push(column.clone());
                values.push(SqlValue::Text(now.to_string()));
            }
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entity,
            columns.join(", "),
            placeholders(columns.len())
        );
        self.conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(fail)?;

        tracing::debug!(entity, id = %id, "sqlite insert under given id");
        Ok(())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn check_name<'n>(name: &'n str, entity: &str) -> ProviderResult<&'n str> {
    validate_identifier(name).map_err(|e| RtError::from(e).with_entity(entity))
}

fn read_row(entity: &str, columns: &[String], row: &Row<'_>) -> rusqlite::Result<Model> {
    let mut id = None;
    let mut properties = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let value = row.get_ref(i)?;
        if column == ID_PROPERTY {
            id = id_from_sql(value);
        } else {
            properties.push((column.clone(), from_sql(value)));
        }
    }
    let base = match id {
        Some(id) => Model::with_id(entity, id),
        None => Model::new(entity),
    };
    Ok(properties.into_iter().fold(base, |m, (k, v)| m.with(k, v)))
}

impl DataProvider for SqliteProvider<'_> {
    fn fetch_all(&self, entity: &str, config: &Config) -> ProviderResult<Collection> {
        check_name(entity, entity)?;
        let projection = config.projection();
        for column in &projection {
            check_name(column, entity)?;
        }

        let columns = if projection.is_empty() {
            "*".to_string()
        } else {
            projection.join(", ")
        };
        let (where_sql, mut params) = self.where_clause(entity, config)?;
        let mut sql = format!("SELECT {} FROM {}{}", columns, entity, where_sql);

        if !config.sort.is_empty() {
            let order =
                compile_order_by(&config.sort).map_err(|e| RtError::from(e).with_entity(entity))?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if config.amount > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(config.amount as i64));
            params.push(SqlValue::Integer(config.start as i64));
        } else if config.start > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(SqlValue::Integer(config.start as i64));
        }

        let fail = |e: rusqlite::Error| from_rusqlite(e).with_op("fetch_all").with_entity(entity);
        let mut stmt = self.conn.prepare(&sql).map_err(fail)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let models = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                read_row(entity, &names, row)
            })
            .map_err(fail)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(fail)?;

        tracing::debug!(entity, rows = models.len(), "sqlite fetch_all");
        Ok(models.into_iter().collect())
    }

    fn count(&self, entity: &str, config: &Config) -> ProviderResult<u64> {
        check_name(entity, entity)?;
        let (where_sql, params) = self.where_clause(entity, config)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", entity, where_sql);
        let n: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|e| from_rusqlite(e).with_op("count").with_entity(entity))?;
        Ok(n as u64)
    }

    fn save(&mut self, model: &mut Model) -> ProviderResult<()> {
        let entity = model.entity().to_string();
        check_name(&entity, &entity)?;
        for column in model.properties().keys() {
            check_name(column, &entity)?;
        }

        let settings = self.settings.entity(&entity);
        let now = chrono::Utc::now().to_rfc3339();
        // Stamps and the assigned id reach the caller only after a successful write
        let mut staged = model.clone();
        if let Some(column) = &settings.updated_column {
            staged.set(column.clone(), now.as_str());
        }

        match staged.id().cloned() {
            None => self.insert(&mut staged, &settings, &now)?,
            Some(id) => self.update(&staged, &id, &settings, &now)?,
        }
        *model = staged;
        Ok(())
    }

    fn delete(&mut self, entity: &str, id: &RecordId) -> ProviderResult<()> {
        check_name(entity, entity)?;
        let sql = format!("DELETE FROM {} WHERE {} = ?", entity, ID_PROPERTY);
        let removed = self
            .conn
            .execute(&sql, [id_to_sql(id)])
            .map_err(|e| {
                from_rusqlite(e)
                    .with_op("delete")
                    .with_entity(entity)
                    .with_record_id(id.to_string())
            })?;
        tracing::debug!(entity, id = %id, removed, "sqlite delete");
        Ok(())
    }

    fn begin(&mut self) -> ProviderResult<()> {
        let sql = if self.depth == 0 {
            "BEGIN IMMEDIATE".to_string()
        } else {
            format!("SAVEPOINT reltree_{}", self.depth)
        };
        self.conn
            .execute_batch(&sql)
            .map_err(|e| from_rusqlite(e).with_op("begin"))?;
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> ProviderResult<()> {
        let depth = self.depth.checked_sub(1).ok_or_else(no_transaction)?;
        let sql = if depth == 0 {
            "COMMIT".to_string()
        } else {
            format!("RELEASE reltree_{}", depth)
        };
        self.conn
            .execute_batch(&sql)
            .map_err(|e| from_rusqlite(e).with_op("commit"))?;
        self.depth = depth;
        Ok(())
    }

    fn rollback(&mut self) -> ProviderResult<()> {
        let depth = self.depth.checked_sub(1).ok_or_else(no_transaction)?;
        let sql = if depth == 0 {
            "ROLLBACK".to_string()
        } else {
            format!("ROLLBACK TO reltree_{0}; RELEASE reltree_{0}", depth)
        };
        // The level is closed even if the statement fails
        self.depth = depth;
        self.conn
            .execute_batch(&sql)
            .map_err(|e| from_rusqlite(e).with_op("rollback"))
    }
}

fn no_transaction() -> RtError {
    RtError::new(reltree_core::RtErrorKind::Internal).with_message("No open transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reltree_core::{transaction, Filter, RtErrorKind, SortKey};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, code TEXT, rank INTEGER);
             INSERT INTO items (id, code, rank) VALUES (1, 'a', 30), (2, 'b', 10), (3, 'b', 20);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_fetch_all_filter_sort_page() {
        let conn = conn();
        let p = SqliteProvider::new(&conn);
        let cfg = Config::new()
            .with_filter(Filter::eq("code", "b"))
            .sort_by(SortKey::desc("rank"));
        assert_eq!(
            p.fetch_all("items", &cfg).unwrap().ids(),
            vec![RecordId::Int(3), RecordId::Int(2)]
        );

        let skip_only = Config::new().sort_by(SortKey::asc("id")).page(0, 2);
        assert_eq!(p.fetch_ids("items", &skip_only).unwrap(), vec![RecordId::Int(3)]);
    }

    #[test]
    fn test_projection_keeps_id() {
        let conn = conn();
        let p = SqliteProvider::new(&conn);
        let model = p
            .fetch("items", &Config::by_id(2).fields(["rank"]))
            .unwrap()
            .unwrap();
        assert_eq!(model.id(), Some(&RecordId::Int(2)));
        assert_eq!(model.get("rank"), Some(10.into()));
        assert_eq!(model.get("code"), None);
    }

    #[test]
    fn test_missing_record_is_none() {
        let conn = conn();
        let p = SqliteProvider::new(&conn);
        assert!(p.fetch("items", &Config::by_id(99)).unwrap().is_none());
        assert!(p
            .fetch_all("items", &Config::new().with_filter(Filter::eq("code", "zz")))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_count_ignores_paging() {
        let conn = conn();
        let p = SqliteProvider::new(&conn);
        let cfg = Config::new().with_filter(Filter::eq("code", "b")).page(1, 0);
        assert_eq!(p.count("items", &cfg).unwrap(), 2);
    }

    #[test]
    fn test_insert_assigns_rowid() {
        let conn = conn();
        let mut p = SqliteProvider::new(&conn);
        let mut model = Model::new("items").with("code", "c");
        p.save(&mut model).unwrap();
        assert_eq!(model.id(), Some(&RecordId::Int(4)));
    }

    #[test]
    fn test_update_of_missing_id_inserts() {
        let conn = conn();
        let mut p = SqliteProvider::new(&conn);
        let mut model = Model::with_id("items", 40).with("code", "z");
        p.save(&mut model).unwrap();
        assert_eq!(p.count("items", &Config::new()).unwrap(), 4);

        model.set("code", "y");
        p.save(&mut model).unwrap();
        let stored = p.fetch("items", &Config::by_id(40)).unwrap().unwrap();
        assert_eq!(stored.get("code"), Some("y".into()));
        assert_eq!(p.count("items", &Config::new()).unwrap(), 4);
    }

    #[test]
    fn test_hostile_names_rejected_before_sql() {
        let conn = conn();
        let mut p = SqliteProvider::new(&conn);
        let err = p
            .fetch_all("items; DROP TABLE items", &Config::new())
            .unwrap_err();
        assert_eq!(err.kind(), RtErrorKind::InvalidArgument);

        let mut bad = Model::with_id("items", 1).with("code = 1 --", "x");
        assert_eq!(p.save(&mut bad).unwrap_err().kind(), RtErrorKind::InvalidArgument);
        assert_eq!(p.count("items", &Config::new()).unwrap(), 3);
    }

    #[test]
    fn test_unknown_table_is_persistence_error() {
        let conn = conn();
        let p = SqliteProvider::new(&conn);
        let err = p.fetch_all("nope", &Config::new()).unwrap_err();
        assert_eq!(err.kind(), RtErrorKind::Persistence);
        assert_eq!(err.entity(), Some("nope"));
    }

    #[test]
    fn test_nested_savepoint_rollback() {
        let conn = conn();
        let mut p = SqliteProvider::new(&conn);
        transaction(&mut p, |p| {
            p.delete("items", &RecordId::Int(1))?;
            let inner: ProviderResult<()> = transaction(p, |p| {
                p.delete("items", &RecordId::Int(2))?;
                Err(RtError::new(RtErrorKind::Internal))
            });
            assert!(inner.is_err());
            assert_eq!(p.depth(), 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(p.depth(), 0);
        assert_eq!(
            p.fetch_ids("items", &Config::new().sort_by(SortKey::asc("id")))
                .unwrap(),
            vec![RecordId::Int(2), RecordId::Int(3)]
        );
    }

    #[test]
    fn test_commit_without_begin_is_internal() {
        let conn = conn();
        let mut p = SqliteProvider::new(&conn);
        assert_eq!(p.commit().unwrap_err().kind(), RtErrorKind::Internal);
        assert_eq!(p.rollback().unwrap_err().kind(), RtErrorKind::Internal);
    }
}
