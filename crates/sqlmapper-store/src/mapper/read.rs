//! Read paths: key fetches, selects and aggregates
//!
//! Every public read runs through `SqliteContext::query`; a failure is
//! logged and the caller gets an empty result.

use super::{distinct_keys, Mapper};
use crate::errors::{from_rusqlite, Result};
use crate::value;
use rusqlite::types::{ToSql, ValueRef};
use rusqlite::Params;
use sqlmapper_core::{Entity, PrimaryKey};
use std::sync::atomic::Ordering;

/// Keys bound per IN-list; larger sets are fetched in several statements
pub const MAX_KEYS_PER_QUERY: usize = 999;

impl<T: Entity> Mapper<T> {
    /// Execute a select and decode every row
    fn load<P: Params>(&self, sql: &str, params: P) -> Result<Vec<T>> {
        let raw = self.with_table(|conn| {
            self.queries.fetch_add(1, Ordering::Relaxed);
            let width = self.plan().columns.len();
            let mut stmt = conn.prepare_cached(sql).map_err(from_rusqlite)?;
            let rows = stmt
                .query_map(params, |row| value::read_row(row, width))
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;
            Ok(rows)
        })?;

        let rows = raw
            .into_iter()
            .map(|values| self.entity.decode_row(values))
            .collect::<Result<Vec<T>>>()?;
        tracing::debug!(table = %self.table(), rows = rows.len(), "loaded");
        Ok(rows)
    }

    /// Execute an aggregate; one value per result row
    fn aggregate<P: Params>(&self, sql: &str, params: P) -> Result<Vec<i64>> {
        self.with_table(|conn| {
            self.queries.fetch_add(1, Ordering::Relaxed);
            let mut stmt = conn.prepare_cached(sql).map_err(from_rusqlite)?;
            let values = stmt
                .query_map(params, |row| row.get_ref(0).map(integer_of))
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;
            Ok(values)
        })
    }

    /// Run a read, degrading any failure to `R::default()`
    fn read<R: Default>(&self, op: &str, f: impl FnOnce() -> Result<R>) -> R {
        match self.context() {
            Ok(ctx) => ctx.query(op, || f().map_err(|e| self.annotate(e, op))),
            Err(err) => {
                tracing::error!(
                    op = op,
                    table = %self.table(),
                    err.code = err.code(),
                    message = %err,
                    "query failed"
                );
                R::default()
            }
        }
    }

    /// Column name for an entity field; anything else passes through as SQL
    fn column_of<'a>(&'a self, field: &'a str) -> &'a str {
        self.plan()
            .column_for_field(field)
            .map(|c| c.column.as_str())
            .unwrap_or(field)
    }

    /// Fetch one row by primary key
    pub fn get(&self, key: T::Key) -> Option<T> {
        self.read("get", || {
            let rows = self.load(&self.plan().get_sql, [key.to_i64()])?;
            Ok(rows.into_iter().next())
        })
    }

    /// Fetch the rows with the given keys
    ///
    /// Duplicate keys are fetched once. Result order is the storage order,
    /// not request order. An empty key set runs no query.
    pub fn gets(&self, keys: &[T::Key]) -> Vec<T> {
        self.gets_wide(&keys.iter().map(|k| k.to_i64()).collect::<Vec<_>>())
    }

    /// Fetch the rows listed in comma-joined key text
    ///
    /// Tokens that do not parse as a key are skipped.
    pub fn gets_csv(&self, csv: &str) -> Vec<T> {
        self.gets_wide(&self.parse_csv(csv))
    }

    pub(crate) fn gets_wide(&self, keys: &[i64]) -> Vec<T> {
        let keys = distinct_keys(keys.iter().copied());
        if keys.is_empty() {
            return Vec::new();
        }
        self.read("gets", || {
            let mut rows = Vec::with_capacity(keys.len());
            for chunk in keys.chunks(MAX_KEYS_PER_QUERY) {
                let sql = self.plan().gets_sql(chunk.len());
                rows.extend(self.load(&sql, rusqlite::params_from_iter(chunk.iter()))?);
            }
            Ok(rows)
        })
    }

    fn parse_csv(&self, csv: &str) -> Vec<i64> {
        csv.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .filter_map(|token| match T::Key::parse_token(token) {
                Some(key) => Some(key.to_i64()),
                None => {
                    tracing::warn!(table = %self.table(), token = token, "skipping invalid key");
                    None
                }
            })
            .collect()
    }

    /// Every row, ordered by primary key
    pub fn select(&self) -> Vec<T> {
        self.read("select", || self.load(&self.plan().select_sql(), []))
    }

    pub fn select_ordered(&self, order: &str) -> Vec<T> {
        self.read("select", || {
            self.load(&self.plan().select_ordered_sql(order), [])
        })
    }

    pub fn select_limit(&self, order: &str, limit: i64, offset: i64) -> Vec<T> {
        self.read("select_limit", || {
            self.load(&self.plan().select_limit_sql(order), [limit, offset])
        })
    }

    /// Rows matching a raw predicate, newest key first
    pub fn select_where(&self, predicate: &str, params: &[&dyn ToSql]) -> Vec<T> {
        self.read("select_where", || {
            self.load(&self.plan().select_where_sql(predicate), params)
        })
    }

    pub fn select_where_ordered(
        &self,
        predicate: &str,
        order: &str,
        params: &[&dyn ToSql],
    ) -> Vec<T> {
        self.read("select_where", || {
            self.load(&self.plan().select_where_ordered_sql(predicate, order), params)
        })
    }

    pub fn select_where_limit(
        &self,
        predicate: &str,
        order: &str,
        params: &[&dyn ToSql],
        limit: i64,
        offset: i64,
    ) -> Vec<T> {
        self.read("select_where_limit", || {
            let mut all: Vec<&dyn ToSql> = params.to_vec();
            all.push(&limit);
            all.push(&offset);
            self.load(
                &self.plan().select_where_limit_sql(predicate, order),
                &all[..],
            )
        })
    }

    pub fn count(&self) -> i64 {
        self.read("count", || {
            Ok(first(self.aggregate(&self.plan().count_sql(None, None), [])?))
        })
    }

    /// One count per group
    pub fn count_group_by(&self, group_by: &str) -> Vec<i64> {
        self.read("count", || {
            self.aggregate(&self.plan().count_sql(None, Some(group_by)), [])
        })
    }

    pub fn count_where(&self, predicate: &str, params: &[&dyn ToSql]) -> i64 {
        self.read("count_where", || {
            Ok(first(
                self.aggregate(&self.plan().count_sql(Some(predicate), None), params)?,
            ))
        })
    }

    pub fn count_where_group_by(
        &self,
        predicate: &str,
        group_by: &str,
        params: &[&dyn ToSql],
    ) -> Vec<i64> {
        self.read("count_where", || {
            self.aggregate(
                &self.plan().count_sql(Some(predicate), Some(group_by)),
                params,
            )
        })
    }

    /// Sum of a field over matching rows; 0 when nothing matches
    pub fn sum_where(&self, field: &str, predicate: &str, params: &[&dyn ToSql]) -> i64 {
        self.read("sum_where", || {
            let sql = self.plan().sum_sql(self.column_of(field), predicate, None);
            Ok(first(self.aggregate(&sql, params)?))
        })
    }

    /// One sum per group
    pub fn sum_where_group_by(
        &self,
        field: &str,
        predicate: &str,
        group_by: &str,
        params: &[&dyn ToSql],
    ) -> Vec<i64> {
        self.read("sum_where", || {
            let sql = self
                .plan()
                .sum_sql(self.column_of(field), predicate, Some(group_by));
            self.aggregate(&sql, params)
        })
    }
}

fn first(values: Vec<i64>) -> i64 {
    values.first().copied().unwrap_or(0)
}

/// Aggregates come back as integer, real or NULL
fn integer_of(value: ValueRef<'_>) -> i64 {
    match value {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
        ValueRef::Null | ValueRef::Blob(_) => 0,
    }
}
