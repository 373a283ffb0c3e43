//! Fetch request value object
//!
//! A `Config` describes one fetch: which rows (explicit ids and/or a
//! filter), in what order, which page, and which columns. The UI layer
//! assembles it; providers only read it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filter::Filter;
use crate::model::{RecordId, ID_PROPERTY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One entry of an ordered sort list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
        }
    }
}

/// Explicit primary-key selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdSelector {
    One(RecordId),
    Many(Vec<RecordId>),
}

impl IdSelector {
    pub fn ids(&self) -> &[RecordId] {
        match self {
            IdSelector::One(id) => std::slice::from_ref(id),
            IdSelector::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub id: Option<IdSelector>,
    pub filter: Option<Filter>,
    pub sort: Vec<SortKey>,
    /// Page size; 0 means unlimited
    pub amount: usize,
    /// Rows to skip
    pub start: usize,
    /// Projected columns; empty means all. `id` is always returned.
    pub fields: Vec<String>,
    /// Return identities only
    pub id_only: bool,
    /// Free-form options for custom providers
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<RecordId>) -> Self {
        Self {
            id: Some(IdSelector::One(id.into())),
            ..Self::default()
        }
    }

    pub fn by_ids<I: IntoIterator<Item = RecordId>>(ids: I) -> Self {
        Self {
            id: Some(IdSelector::Many(ids.into_iter().collect())),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// AND an additional filter onto the current one
    pub fn and_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(current) => current.and(filter),
            None => filter,
        });
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn page(mut self, amount: usize, start: usize) -> Self {
        self.amount = amount;
        self.start = start;
        self
    }

    pub fn limit(mut self, amount: usize) -> Self {
        self.amount = amount;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn ids_only(mut self) -> Self {
        self.id_only = true;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Projection with `id` first and duplicates removed; empty means all
    pub fn projection(&self) -> Vec<String> {
        if self.id_only {
            return vec![ID_PROPERTY.to_string()];
        }
        if self.fields.is_empty() {
            return Vec::new();
        }
        let mut out = vec![ID_PROPERTY.to_string()];
        for field in &self.fields {
            if !out.contains(field) {
                out.push(field.clone());
            }
        }
        out
    }

    /// True for an explicit, empty id set: the request matches no record
    pub fn selects_nothing(&self) -> bool {
        matches!(&self.id, Some(IdSelector::Many(ids)) if ids.is_empty())
    }

    /// The filter this request selects, with any explicit ids folded in
    ///
    /// Providers check `selects_nothing` first; an empty id set folds into an
    /// empty IN list, which does not compile.
    pub fn effective_filter(&self) -> Option<Filter> {
        let by_id = self.id.as_ref().map(|sel| match sel {
            IdSelector::One(id) => Filter::eq(ID_PROPERTY, id.to_value()),
            IdSelector::Many(ids) => {
                Filter::is_in(ID_PROPERTY, ids.iter().map(RecordId::to_value))
            }
        });
        match (by_id, self.filter.clone()) {
            (Some(a), Some(b)) => Some(a.and(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }
}
