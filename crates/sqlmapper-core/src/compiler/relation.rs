//! Relation resolution procedures
//!
//! A relation binding is compiled per relation field. At run time it needs
//! the target entity's mapper, which it obtains through `RelatedLookup` as an
//! `Arc<dyn RelatedStore<U>>`. Fetches are batched: one target query per
//! relation per call, except for comma-joined links which are fetched per row.

use super::plan::{RelationPlan, RelationStrategy};
use crate::catalog::schema::RelationSpec;
use crate::errors::{OrmError, OrmErrorKind, Result, SchemaError};
use crate::model::decl::{ColumnGetter, ErasedAccessor, RelationShape};
use crate::model::{Cardinality, Entity, RelationGetter, RelationSetter};
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

/// Target-side operations a relation needs
pub trait RelatedStore<U>: Send + Sync {
    /// Primary key of a target row, widened
    fn key_of(&self, row: &U) -> i64;

    /// Fetch the rows with the given keys, resolving their own relations up
    /// to `depth` further levels
    fn fetch_by_keys(&self, keys: &[i64], depth: usize) -> Vec<U>;

    /// Fetch the rows listed in comma-joined key text
    fn fetch_by_csv(&self, csv: &str, depth: usize) -> Vec<U>;

    /// Save rows and, up to `depth` further levels, their relations
    ///
    /// # Errors
    ///
    /// Propagates the target mapper's write failure.
    fn save_related(&self, rows: &[U], depth: usize) -> Result<bool>;
}

/// Finds the related store registered for an entity type
pub trait RelatedLookup {
    /// An `Arc<dyn RelatedStore<U>>` for `target == TypeId::of::<U>()`, boxed as `Any`
    fn related(&self, target: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Typed access to the related store for `U`
pub fn related_store<U: 'static>(lookup: &dyn RelatedLookup) -> Option<Arc<dyn RelatedStore<U>>> {
    lookup
        .related(TypeId::of::<U>())?
        .downcast_ref::<Arc<dyn RelatedStore<U>>>()
        .cloned()
}

/// Compiled resolution procedure for one relation of `T`
pub trait RelationBinding<T>: Send + Sync {
    fn plan(&self) -> &RelationPlan;

    /// Attach related rows to `rows`
    ///
    /// # Errors
    ///
    /// `UnknownMapper` if no store is registered for the target.
    fn resolve(&self, rows: &mut [T], lookup: &dyn RelatedLookup, depth: usize) -> Result<()>;

    /// Save the related rows held by `rows`
    ///
    /// # Errors
    ///
    /// `UnknownMapper`, or the target's write failure.
    fn save(&self, rows: &[T], lookup: &dyn RelatedLookup, depth: usize) -> Result<()>;
}

/// Inputs for compiling one relation binding
pub(crate) struct RelationParts<T> {
    pub(crate) entity: String,
    pub(crate) spec: RelationSpec,
    pub(crate) link: ColumnGetter<T>,
    pub(crate) getter: ErasedAccessor,
    pub(crate) getter_shape: RelationShape,
    pub(crate) getter_method: String,
    pub(crate) setter: ErasedAccessor,
    pub(crate) setter_shape: RelationShape,
    pub(crate) setter_method: String,
}

pub(crate) type RelationFactory<T> =
    fn(RelationParts<T>) -> std::result::Result<Arc<dyn RelationBinding<T>>, SchemaError>;

pub(crate) fn relation_plan(spec: &RelationSpec) -> RelationPlan {
    RelationPlan {
        name: spec.name.clone(),
        cardinality: spec.cardinality,
        strategy: RelationStrategy::select(spec.cardinality, spec.link_type),
        link_field: spec.link_field.clone(),
        target: spec.target.clone(),
    }
}

/// Build the binding for a relation targeting `U`
///
/// Monomorphized per relation declaration and stored as a `RelationFactory`.
pub(crate) fn bind_relation<T: Entity, U: Entity>(
    parts: RelationParts<T>,
) -> std::result::Result<Arc<dyn RelationBinding<T>>, SchemaError> {
    let expected = parts.spec.cardinality.shape();
    let mismatch = |method: &str, reason: String| SchemaError::AccessorTypeMismatch {
        entity: parts.entity.clone(),
        field: parts.spec.name.clone(),
        method: method.to_string(),
        reason,
    };

    if parts.getter_shape != expected {
        return Err(mismatch(
            &parts.getter_method,
            format!("returns {:?}, relation holds {:?}", parts.getter_shape, expected),
        ));
    }
    if parts.setter_shape != expected {
        return Err(mismatch(
            &parts.setter_method,
            format!("takes {:?}, relation holds {:?}", parts.setter_shape, expected),
        ));
    }

    let get = parts
        .getter
        .downcast_ref::<RelationGetter<T, U>>()
        .cloned()
        .ok_or_else(|| {
            mismatch(
                &parts.getter_method,
                format!("does not return {}", std::any::type_name::<U>()),
            )
        })?;
    let set = parts
        .setter
        .downcast_ref::<RelationSetter<T, U>>()
        .cloned()
        .ok_or_else(|| {
            mismatch(
                &parts.setter_method,
                format!("does not take {}", std::any::type_name::<U>()),
            )
        })?;

    Ok(Arc::new(TypedRelation {
        plan: relation_plan(&parts.spec),
        link: parts.link,
        get,
        set,
    }))
}

struct TypedRelation<T, U> {
    plan: RelationPlan,
    link: ColumnGetter<T>,
    get: RelationGetter<T, U>,
    set: RelationSetter<T, U>,
}

impl<T: Entity, U: Entity> TypedRelation<T, U> {
    fn store(&self, lookup: &dyn RelatedLookup) -> Result<Arc<dyn RelatedStore<U>>> {
        related_store::<U>(lookup).ok_or_else(|| {
            OrmError::new(OrmErrorKind::UnknownMapper)
                .with_op("resolve_relation")
                .with_entity(self.plan.target.clone())
                .with_field(self.plan.name.clone())
                .with_message("no mapper registered for relation target")
        })
    }

    fn resolve_batched(&self, rows: &mut [T], store: &dyn RelatedStore<U>, depth: usize) {
        let links: Vec<Option<i64>> = rows.iter().map(|r| (self.link)(r).as_i64()).collect();

        let mut seen = HashSet::new();
        let keys: Vec<i64> = links
            .iter()
            .flatten()
            .copied()
            .filter(|k| seen.insert(*k))
            .collect();
        if keys.is_empty() {
            return;
        }

        let targets = store.fetch_by_keys(&keys, depth);
        for (row, link) in rows.iter_mut().zip(links) {
            let Some(link) = link else { continue };
            let mut matches = targets.iter().filter(|t| store.key_of(t) == link);

            match self.plan.strategy {
                RelationStrategy::BatchedSingle => {
                    if let Some(first) = matches.next() {
                        (self.set)(row, vec![first.clone()]);
                    }
                }
                _ => {
                    let found = self.collection(matches.cloned().collect(), store);
                    (self.set)(row, found);
                }
            }
        }
    }

    fn resolve_comma_joined(&self, rows: &mut [T], store: &dyn RelatedStore<U>, depth: usize) {
        for row in rows.iter_mut() {
            let link = (self.link)(row);
            let Some(csv) = link.as_text() else {
                // Empty key list: a collection resolves to empty
                if self.plan.cardinality != Cardinality::Single {
                    (self.set)(row, Vec::new());
                }
                continue;
            };

            let mut found = store.fetch_by_csv(csv, depth);
            if self.plan.cardinality == Cardinality::Single {
                found.truncate(1);
                if found.is_empty() {
                    continue;
                }
            }
            (self.set)(row, self.collection(found, store));
        }
    }

    /// The value a collection relation is set to: exactly the fetched
    /// targets, unique by key for `Set`
    ///
    /// Whatever the row held before is replaced, so resolving twice gives
    /// the same result as resolving once.
    fn collection(&self, mut found: Vec<U>, store: &dyn RelatedStore<U>) -> Vec<U> {
        if self.plan.cardinality == Cardinality::Set {
            let mut keys = HashSet::new();
            found.retain(|t| keys.insert(store.key_of(t)));
        }
        found
    }
}

impl<T: Entity, U: Entity> RelationBinding<T> for TypedRelation<T, U> {
    fn plan(&self) -> &RelationPlan {
        &self.plan
    }

    fn resolve(&self, rows: &mut [T], lookup: &dyn RelatedLookup, depth: usize) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let store = self.store(lookup)?;
        match self.plan.strategy {
            RelationStrategy::CommaJoined => self.resolve_comma_joined(rows, store.as_ref(), depth),
            RelationStrategy::BatchedSingle | RelationStrategy::BatchedCollection => {
                self.resolve_batched(rows, store.as_ref(), depth)
            }
        }
        Ok(())
    }

    fn save(&self, rows: &[T], lookup: &dyn RelatedLookup, depth: usize) -> Result<()> {
        let related: Vec<U> = rows.iter().flat_map(|r| (self.get)(r)).collect();
        if related.is_empty() {
            return Ok(());
        }
        let store = self.store(lookup)?;
        store.save_related(&related, depth)?;
        Ok(())
    }
}
