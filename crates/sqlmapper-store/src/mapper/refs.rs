//! Relation resolution and the `*_with_ref` variants
//!
//! `depth` counts relation levels still to resolve. A top-level call starts
//! at `max_ref_depth`; each hop into a target mapper spends one level, so
//! cyclic relation graphs terminate.

use super::Mapper;
use crate::errors::Result;
use rusqlite::types::ToSql;
use sqlmapper_core::compiler::RelatedStore;
use sqlmapper_core::errors::{OrmError, OrmErrorKind};
use sqlmapper_core::Entity;

impl<T: Entity> Mapper<T> {
    /// Resolve every relation of `rows`, in declaration order
    ///
    /// # Errors
    ///
    /// `UnknownMapper` if a relation target has no mapper.
    pub fn wrap_ref(&self, rows: &mut [T]) -> Result<()> {
        self.wrap_ref_depth(rows, self.max_ref_depth)
    }

    /// # Errors
    ///
    /// See `wrap_ref`.
    pub fn wrap_ref_one(&self, row: &mut T) -> Result<()> {
        self.wrap_ref(std::slice::from_mut(row))
    }

    /// Resolve a single named relation
    ///
    /// # Errors
    ///
    /// `Internal` if `T` declares no relation called `name`, otherwise see
    /// `wrap_ref`.
    pub fn wrap_ref_relation(&self, rows: &mut [T], name: &str) -> Result<()> {
        let binding = self.entity.relation(name).ok_or_else(|| {
            OrmError::new(OrmErrorKind::Internal)
                .with_op("wrap_ref_relation")
                .with_entity(self.plan().entity.clone())
                .with_field(name)
                .with_message("no relation with this name")
        })?;
        if rows.is_empty() || self.max_ref_depth == 0 {
            return Ok(());
        }
        let registry = self.registry()?;
        binding.resolve(rows, &*registry, self.max_ref_depth - 1)
    }

    pub(crate) fn wrap_ref_depth(&self, rows: &mut [T], depth: usize) -> Result<()> {
        if rows.is_empty() || depth == 0 || self.entity.relations().is_empty() {
            return Ok(());
        }
        let registry = self.registry()?;
        for binding in self.entity.relations() {
            binding.resolve(rows, &*registry, depth - 1)?;
        }
        Ok(())
    }

    fn save_refs_depth(&self, rows: &[T], depth: usize) -> Result<()> {
        if rows.is_empty() || depth == 0 || self.entity.relations().is_empty() {
            return Ok(());
        }
        let registry = self.registry()?;
        for binding in self.entity.relations() {
            binding.save(rows, &*registry, depth - 1)?;
        }
        Ok(())
    }

    /// Resolve relations on a read result, logging instead of failing
    fn resolved(&self, mut rows: Vec<T>, depth: usize) -> Vec<T> {
        if let Err(err) = self.wrap_ref_depth(&mut rows, depth) {
            tracing::error!(
                op = "wrap_ref",
                table = %self.table(),
                err.code = err.code(),
                message = %err,
                "relation resolution failed"
            );
        }
        rows
    }

    pub fn get_with_ref(&self, key: T::Key) -> Option<T> {
        let row = self.get(key)?;
        self.resolved(vec![row], self.max_ref_depth).pop()
    }

    pub fn gets_with_ref(&self, keys: &[T::Key]) -> Vec<T> {
        self.resolved(self.gets(keys), self.max_ref_depth)
    }

    pub fn gets_csv_with_ref(&self, csv: &str) -> Vec<T> {
        self.resolved(self.gets_csv(csv), self.max_ref_depth)
    }

    pub fn select_with_ref(&self) -> Vec<T> {
        self.resolved(self.select(), self.max_ref_depth)
    }

    pub fn select_ordered_with_ref(&self, order: &str) -> Vec<T> {
        self.resolved(self.select_ordered(order), self.max_ref_depth)
    }

    pub fn select_limit_with_ref(&self, order: &str, limit: i64, offset: i64) -> Vec<T> {
        self.resolved(self.select_limit(order, limit, offset), self.max_ref_depth)
    }

    pub fn select_where_with_ref(&self, predicate: &str, params: &[&dyn ToSql]) -> Vec<T> {
        self.resolved(self.select_where(predicate, params), self.max_ref_depth)
    }

    pub fn select_where_ordered_with_ref(
        &self,
        predicate: &str,
        order: &str,
        params: &[&dyn ToSql],
    ) -> Vec<T> {
        self.resolved(
            self.select_where_ordered(predicate, order, params),
            self.max_ref_depth,
        )
    }

    pub fn select_where_limit_with_ref(
        &self,
        predicate: &str,
        order: &str,
        params: &[&dyn ToSql],
        limit: i64,
        offset: i64,
    ) -> Vec<T> {
        self.resolved(
            self.select_where_limit(predicate, order, params, limit, offset),
            self.max_ref_depth,
        )
    }

    /// Save a row, then the rows held by its relations
    ///
    /// Returns false without touching the relations when the row itself
    /// was not written.
    ///
    /// # Errors
    ///
    /// The first write failure, here or in a target mapper.
    pub fn save_with_ref(&self, row: &T) -> Result<bool> {
        if !self.save(row)? {
            return Ok(false);
        }
        self.save_refs_depth(std::slice::from_ref(row), self.max_ref_depth)?;
        Ok(true)
    }

    /// # Errors
    ///
    /// See `save_with_ref`.
    pub fn save_all_with_ref(&self, rows: &[T]) -> Result<bool> {
        if !self.save_all(rows)? {
            return Ok(false);
        }
        self.save_refs_depth(rows, self.max_ref_depth)?;
        Ok(true)
    }
}

impl<T: Entity> RelatedStore<T> for Mapper<T> {
    fn key_of(&self, row: &T) -> i64 {
        self.entity.key_of(row)
    }

    fn fetch_by_keys(&self, keys: &[i64], depth: usize) -> Vec<T> {
        self.resolved(self.gets_wide(keys), depth)
    }

    fn fetch_by_csv(&self, csv: &str, depth: usize) -> Vec<T> {
        self.resolved(self.gets_csv(csv), depth)
    }

    fn save_related(&self, rows: &[T], depth: usize) -> Result<bool> {
        if !self.save_all(rows)? {
            return Ok(false);
        }
        self.save_refs_depth(rows, depth)?;
        Ok(true)
    }
}
