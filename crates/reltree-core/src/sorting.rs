//! Sparse manual-order keys
//!
//! Siblings carry integer keys spaced `gap` apart. A new key is taken from
//! the middle of the gap at the requested position. When no gap is left the
//! whole scope is renumbered `gap, 2*gap, ...` and the allocation retried
//! once. Renumbering and the save of the placed record share a transaction.

#![allow(clippy::result_large_err)]

use crate::config::{Config, SortKey};
use crate::errors::{RelTreeError, Result, RtError};
use crate::filter::{Filter, Params};
use crate::model::{Model, RecordId, ID_PROPERTY};
use crate::provider::{transaction, DataProvider, ProviderResult};
use crate::relationship::RelationshipRegistry;
use crate::tree::DEFAULT_SORT_PROPERTY;

pub const DEFAULT_GAP: i64 = 256;

/// Gaps at or below this are treated as exhausted
pub const MIN_ROOM: i64 = 2;

/// Where to put a record among its siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Start,
    After(RecordId),
    End,
}

/// The set of records that share one ordering
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingScope {
    pub entity: String,
    pub filter: Filter,
}

impl SiblingScope {
    pub fn new(entity: impl Into<String>, filter: Filter) -> Self {
        Self {
            entity: entity.into(),
            filter,
        }
    }

    /// Top-level records of `entity`
    ///
    /// # Errors
    ///
    /// `MissingRootCondition` or `UnresolvedPlaceholder`.
    pub fn root(registry: &RelationshipRegistry, entity: &str, params: &Params) -> Result<Self> {
        Ok(Self::new(entity, registry.compute_root_filter(entity, params)?))
    }

    /// `child_entity` records below `parent`
    ///
    /// # Errors
    ///
    /// `MissingChildCondition` or `UnresolvedPlaceholder`.
    pub fn children_of(
        registry: &RelationshipRegistry,
        parent: &Model,
        child_entity: &str,
        params: &Params,
    ) -> Result<Self> {
        let filter = registry.compute_child_filter(parent.entity(), child_entity, parent, params)?;
        Ok(Self::new(child_entity, filter))
    }
}

/// Result of `place`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub key: i64,
    pub renormalized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortingPositionResolver {
    gap: i64,
    property: String,
}

impl Default for SortingPositionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_GAP, DEFAULT_SORT_PROPERTY)
    }
}

impl SortingPositionResolver {
    pub fn new(gap: i64, property: impl Into<String>) -> Self {
        Self {
            gap: gap.max(MIN_ROOM + 1),
            property: property.into(),
        }
    }

    pub fn gap(&self) -> i64 {
        self.gap
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Compute a key for `placement` without writing anything
    ///
    /// Returns `None` when the scope needs renumbering first. `exclude` is
    /// the record being moved, which is never its own sibling.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the anchor is not in the scope, otherwise
    /// any provider error.
    pub fn position<P: DataProvider + ?Sized>(
        &self,
        provider: &P,
        scope: &SiblingScope,
        placement: &Placement,
        exclude: Option<&RecordId>,
    ) -> ProviderResult<Option<i64>> {
        let siblings = self.siblings(provider, scope, exclude)?;
        if siblings.iter().any(|(_, key)| key.is_none()) {
            return Ok(None);
        }
        let keys: Vec<(RecordId, i64)> = siblings
            .into_iter()
            .filter_map(|(id, key)| key.map(|k| (id, k)))
            .collect();

        let key = match placement {
            Placement::Start => match keys.first() {
                None => Some(self.gap),
                Some((_, lowest)) if *lowest <= MIN_ROOM => None,
                Some((_, lowest)) => Some(lowest.div_euclid(2)),
            },
            Placement::End => Some(keys.last().map_or(self.gap, |(_, highest)| highest + self.gap)),
            Placement::After(anchor) => {
                let index = keys
                    .iter()
                    .position(|(id, _)| id == anchor)
                    .ok_or_else(|| {
                        RtError::from(RelTreeError::AnchorNotInScope {
                            entity: scope.entity.clone(),
                            anchor: anchor.to_string(),
                        })
                    })?;
                let current = keys[index].1;
                match keys.get(index + 1) {
                    None => Some(current + 2 * self.gap),
                    Some((_, next)) if next - current <= MIN_ROOM => None,
                    Some((_, next)) => Some(current + (next - current).div_euclid(2)),
                }
            }
        };
        Ok(key)
    }

    /// Renumber the scope `gap, 2*gap, ...` in (key, id) order
    ///
    /// Returns the number of records rewritten.
    ///
    /// # Errors
    ///
    /// Any provider error.
    pub fn renormalize<P: DataProvider + ?Sized>(
        &self,
        provider: &mut P,
        scope: &SiblingScope,
        exclude: Option<&RecordId>,
    ) -> ProviderResult<usize> {
        let siblings = self.siblings(provider, scope, exclude)?;
        let mut rewritten = 0;
        for (i, (id, current)) in siblings.into_iter().enumerate() {
            let key = (i as i64 + 1) * self.gap;
            if current == Some(key) {
                continue;
            }
            let mut row = Model::with_id(scope.entity.clone(), id);
            row.set(self.property.clone(), key);
            provider.save(&mut row)?;
            rewritten += 1;
        }
        tracing::debug!(entity = %scope.entity, rewritten, "sibling scope renormalized");
        Ok(rewritten)
    }

    /// Allocate a key for `model`, write it and save the model, atomically
    ///
    /// Renumbers the scope at most once.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an anchor outside the scope, `Internal` if
    /// renumbering still left no room, otherwise any provider error. Nothing
    /// is written on error.
    pub fn place<P: DataProvider + ?Sized>(
        &self,
        provider: &mut P,
        scope: &SiblingScope,
        model: &mut Model,
        placement: &Placement,
    ) -> ProviderResult<PlacementOutcome> {
        let exclude = model.id().cloned();
        transaction(provider, |p| {
            let mut renormalized = false;
            let key = match self.position(&*p, scope, placement, exclude.as_ref())? {
                Some(key) => key,
                None => {
                    self.renormalize(p, scope, exclude.as_ref())?;
                    renormalized = true;
                    self.position(&*p, scope, placement, exclude.as_ref())?
                        .ok_or_else(|| {
                            RtError::from(RelTreeError::RenormalizationExhausted {
                                entity: scope.entity.clone(),
                            })
                        })?
                }
            };
            model.set(self.property.clone(), key);
            p.save(model)?;
            Ok(PlacementOutcome { key, renormalized })
        })
    }

    fn siblings<P: DataProvider + ?Sized>(
        &self,
        provider: &P,
        scope: &SiblingScope,
        exclude: Option<&RecordId>,
    ) -> ProviderResult<Vec<(RecordId, Option<i64>)>> {
        let config = Config::new()
            .with_filter(scope.filter.clone())
            .sort_by(SortKey::asc(self.property.clone()))
            .sort_by(SortKey::asc(ID_PROPERTY))
            .fields([self.property.clone()]);
        let rows = provider.fetch_all(&scope.entity, &config)?;
        Ok(rows
            .into_iter()
            .filter_map(|m| {
                let id = m.id().cloned()?;
                if Some(&id) == exclude {
                    return None;
                }
                Some((id, m.value(&self.property).as_i64()))
            })
            .collect())
    }
}
