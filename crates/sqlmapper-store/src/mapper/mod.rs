//! Entity mapper: one generic executor per entity type
//!
//! A `Mapper<T>` interprets the compiled `MappingPlan` of `T` against the
//! persistence context owning `T`'s database tag. The context is looked up
//! and the table migrated lazily on first use; migration is repeated
//! whenever the context hands out a new connection.
//!
//! Reads go through `SqliteContext::query` and degrade to empty results.
//! Writes return `Result` and join the calling thread's `update`
//! transaction when one is open; while another thread's `update` runs on
//! the same context they wait for it to finish.

#![allow(clippy::result_large_err)]

mod read;
mod refs;
mod write;

use crate::context::SqliteContext;
use crate::engine::ContextRegistry;
use crate::errors::Result;
use crate::migrator::{self, MigrationReport};
use crate::registry::Registry;
use rusqlite::Connection;
use serde::Serialize;
use sqlmapper_core::errors::{OrmError, OrmErrorKind};
use sqlmapper_core::{CompiledEntity, Entity, MappingPlan};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Statement counters for one mapper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapperStats {
    /// Read statements executed (selects and aggregates)
    pub queries: u64,
    /// Write statements executed; a batch save counts each row
    pub writes: u64,
}

pub struct Mapper<T: Entity> {
    entity: Arc<CompiledEntity<T>>,
    contexts: Arc<ContextRegistry>,
    registry: Weak<Registry>,
    context: Mutex<Option<Arc<SqliteContext>>>,
    /// Connection generation the table was last migrated against; 0 = never
    migrated: AtomicU64,
    max_ref_depth: usize,
    queries: AtomicU64,
    writes: AtomicU64,
}

impl<T: Entity> Mapper<T> {
    pub(crate) fn new(
        entity: Arc<CompiledEntity<T>>,
        contexts: Arc<ContextRegistry>,
        registry: Weak<Registry>,
        max_ref_depth: usize,
    ) -> Self {
        Self {
            entity,
            contexts,
            registry,
            context: Mutex::new(None),
            migrated: AtomicU64::new(0),
            max_ref_depth,
            queries: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn entity(&self) -> &CompiledEntity<T> {
        &self.entity
    }

    pub fn plan(&self) -> &MappingPlan {
        self.entity.plan()
    }

    pub fn table(&self) -> &str {
        &self.entity.plan().table
    }

    pub fn max_ref_depth(&self) -> usize {
        self.max_ref_depth
    }

    pub fn stats(&self) -> MapperStats {
        MapperStats {
            queries: self.queries.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// The context owning this entity's tag, bound on first use
    ///
    /// # Errors
    ///
    /// `UnknownContext` if no context is configured for the tag.
    pub fn context(&self) -> Result<Arc<SqliteContext>> {
        let mut bound = self.context.lock().map_err(|_| {
            OrmError::new(OrmErrorKind::Internal)
                .with_table(self.table())
                .with_message("mapper context lock poisoned")
        })?;
        if let Some(ctx) = bound.as_ref() {
            return Ok(ctx.clone());
        }
        let ctx = self
            .contexts
            .get(&self.plan().tag)
            .map_err(|e| e.with_entity(self.plan().entity.clone()))?;
        *bound = Some(ctx.clone());
        Ok(ctx)
    }

    /// Bind the context and migrate the table now
    ///
    /// # Errors
    ///
    /// `UnknownContext`, open failures, or the migration's DDL failure.
    pub fn prepare(&self) -> Result<MigrationReport> {
        let ctx = self.context()?;
        ctx.exclusive(|| {
            ctx.with_connection(|conn, generation| {
                let report = migrator::migrate(conn, self.plan())?;
                self.mark_migrated(conn, generation);
                Ok(report)
            })
        })
        .map_err(|e| self.annotate(e, "prepare"))
    }

    /// Drop cached statements and force the table to be re-checked
    pub fn reset(&self) {
        self.migrated.store(0, Ordering::Release);
        let ctx = match self.context.lock() {
            Ok(mut bound) => bound.take(),
            Err(_) => None,
        };
        if let Some(ctx) = ctx {
            ctx.flush_statements();
        }
    }

    /// Run `f` on the context's connection with the table migrated
    ///
    /// Runs inside the context's writer section, so it never lands in a
    /// transaction another thread has open.
    fn with_table<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let ctx = self.context()?;
        ctx.exclusive(|| {
            ctx.with_connection(|conn, generation| {
                if self.migrated.load(Ordering::Acquire) != generation {
                    migrator::migrate(conn, self.plan())?;
                    self.mark_migrated(conn, generation);
                }
                f(conn)
            })
        })
    }

    /// DDL run inside an open transaction can still be rolled back, so it
    /// only counts once committed; until then every access re-checks.
    fn mark_migrated(&self, conn: &Connection, generation: u64) {
        if conn.is_autocommit() {
            self.migrated.store(generation, Ordering::Release);
        }
    }

    fn registry(&self) -> Result<Arc<Registry>> {
        self.registry.upgrade().ok_or_else(|| {
            OrmError::new(OrmErrorKind::UnknownMapper)
                .with_entity(self.plan().entity.clone())
                .with_message("registry was dropped")
        })
    }

    fn annotate(&self, err: OrmError, op: &str) -> OrmError {
        err.with_op(op)
            .with_entity(self.plan().entity.clone())
            .with_table(self.table())
            .with_tag(self.plan().tag.clone())
    }
}

impl<T: Entity> std::fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("entity", &self.plan().entity)
            .field("table", &self.table())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Keys in first-occurrence order with duplicates removed
pub(crate) fn distinct_keys(keys: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter().filter(|k| seen.insert(*k)).collect()
}
