//! Write paths: upsert, delete and raw bulk statements

use super::Mapper;
use crate::errors::{from_rusqlite, Result};
use crate::value;
use rusqlite::types::{ToSql, Value};
use rusqlite::Connection;
use sqlmapper_core::{log_op_end, log_op_error, log_op_start};
use sqlmapper_core::{Entity, PrimaryKey};
use std::sync::atomic::Ordering;
use std::time::Instant;

impl<T: Entity> Mapper<T> {
    /// Run one logged write operation against the migrated table
    fn write<R>(&self, op: &str, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let table = self.table();
        log_op_start!(op, table = table);
        let start = Instant::now();

        let result = self.with_table(f).map_err(|e| {
            let err = self.annotate(e, op);
            log_op_error!(
                op,
                err,
                duration_ms = start.elapsed().as_millis() as u64,
                table = table
            );
            err
        })?;

        log_op_end!(
            op,
            duration_ms = start.elapsed().as_millis() as u64,
            table = table
        );
        Ok(result)
    }

    fn bound_row(&self, row: &T) -> Result<Vec<Value>> {
        Ok(self
            .entity
            .bind_row(row)?
            .into_iter()
            .map(value::to_sql)
            .collect())
    }

    fn insert_with(&self, conn: &Connection, row: &T) -> Result<usize> {
        let params = self.bound_row(row)?;
        let mut stmt = conn
            .prepare_cached(&self.plan().insert_sql)
            .map_err(from_rusqlite)?;
        let changed = stmt
            .execute(rusqlite::params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(changed)
    }

    /// Upsert one row keyed on its primary key
    ///
    /// Returns whether exactly one row was written.
    ///
    /// # Errors
    ///
    /// `LockContention` or `Persistence` from the engine, `Internal` if an
    /// accessor produced a value of the wrong type.
    pub fn save(&self, row: &T) -> Result<bool> {
        self.write("save", |conn| Ok(self.insert_with(conn, row)? == 1))
    }

    /// Upsert a batch through one cached statement
    ///
    /// Returns whether the batch was non-empty; per-row counts are ignored.
    ///
    /// # Errors
    ///
    /// The first row's failure; earlier rows stay written unless the call
    /// runs inside `update`.
    pub fn save_all(&self, rows: &[T]) -> Result<bool> {
        if rows.is_empty() {
            return Ok(false);
        }
        self.write("save_all", |conn| {
            let mut stmt = conn
                .prepare_cached(&self.plan().insert_sql)
                .map_err(from_rusqlite)?;
            for row in rows {
                let params = self.bound_row(row)?;
                stmt.execute(rusqlite::params_from_iter(params.iter()))
                    .map_err(from_rusqlite)?;
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(true)
        })
    }

    /// Delete a row by its primary key
    ///
    /// Returns whether exactly one row was removed.
    ///
    /// # Errors
    ///
    /// `LockContention` or `Persistence` from the engine.
    pub fn delete(&self, row: &T) -> Result<bool> {
        let key = self.entity.key_of(row);
        self.write("delete", |conn| self.delete_key(conn, key))
    }

    /// Delete by primary key value
    ///
    /// # Errors
    ///
    /// `LockContention` or `Persistence` from the engine.
    pub fn delete_by(&self, key: T::Key) -> Result<bool> {
        self.write("delete_by", |conn| self.delete_key(conn, key.to_i64()))
    }

    fn delete_key(&self, conn: &Connection, key: i64) -> Result<bool> {
        let mut stmt = conn
            .prepare_cached(&self.plan().delete_sql)
            .map_err(from_rusqlite)?;
        let changed = stmt.execute([key]).map_err(from_rusqlite)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(changed == 1)
    }

    /// Delete every row matching a raw predicate; returns the count removed
    ///
    /// # Errors
    ///
    /// `Persistence` for a malformed predicate, or engine failures.
    pub fn delete_where(&self, predicate: &str, params: &[&dyn ToSql]) -> Result<usize> {
        self.write("delete_where", |conn| {
            let changed = conn
                .execute(&self.plan().delete_where_sql(predicate), params)
                .map_err(from_rusqlite)?;
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(changed)
        })
    }

    /// `update <table> set <assignments> where <predicate>`; returns the
    /// count changed
    ///
    /// # Errors
    ///
    /// `Persistence` for malformed SQL, or engine failures.
    pub fn update_where(
        &self,
        assignments: &str,
        predicate: &str,
        params: &[&dyn ToSql],
    ) -> Result<usize> {
        self.write("update_where", |conn| {
            let changed = conn
                .execute(&self.plan().update_where_sql(assignments, predicate), params)
                .map_err(from_rusqlite)?;
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(changed)
        })
    }
}
