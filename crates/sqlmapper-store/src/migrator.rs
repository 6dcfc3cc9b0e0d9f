//! Additive schema migrator
//!
//! Brings a live table up to its compiled mapping plan: creates it if
//! absent, otherwise adds every compiled column missing from the live table
//! (in compiled order) and creates missing indexes. Columns are never
//! dropped or retyped. Every DDL statement bumps `PRAGMA user_version`.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, Result};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sqlmapper_core::MappingPlan;
use std::collections::HashSet;

const SAVEPOINT: &str = "sqlmapper_migrate";

/// What one migration run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub table: String,
    pub created: bool,
    pub added_columns: Vec<String>,
    pub created_indexes: Vec<String>,
    pub ddl_count: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.ddl_count == 0
    }
}

/// Migrate the table of `plan`
///
/// Runs inside a savepoint, so it nests in an open transaction and leaves no
/// partial DDL behind on failure.
pub fn migrate(conn: &Connection, plan: &MappingPlan) -> Result<MigrationReport> {
    conn.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))
        .map_err(from_rusqlite)?;

    match migrate_inner(conn, plan) {
        Ok(report) => {
            conn.execute_batch(&format!("RELEASE {}", SAVEPOINT))
                .map_err(from_rusqlite)?;
            Ok(report)
        }
        Err(e) => {
            let _ = conn.execute_batch(&format!(
                "ROLLBACK TO {0}; RELEASE {0}",
                SAVEPOINT
            ));
            Err(e.with_op("migrate").with_table(plan.table.clone()))
        }
    }
}

fn migrate_inner(conn: &Connection, plan: &MappingPlan) -> Result<MigrationReport> {
    let mut report = MigrationReport {
        table: plan.table.clone(),
        ..MigrationReport::default()
    };

    if !table_exists(conn, &plan.table)? {
        run_ddl(conn, &plan.create_table_sql, &mut report)?;
        report.created = true;
    } else {
        let live = live_columns(conn, &plan.table)?;
        for column in &plan.columns {
            if !live.contains(&column.column.to_lowercase()) {
                run_ddl(conn, &plan.add_column_sql(column), &mut report)?;
                report.added_columns.push(column.column.clone());
            }
        }
    }

    for column in plan.indexed_columns() {
        let name = column.index_name(&plan.table);
        if !index_exists(conn, &name)? {
            run_ddl(conn, &plan.index_sql(column), &mut report)?;
            report.created_indexes.push(name);
        }
    }

    tracing::debug!(
        table = %plan.table,
        created = report.created,
        ddl_count = report.ddl_count,
        "table migrated"
    );
    Ok(report)
}

fn run_ddl(conn: &Connection, sql: &str, report: &mut MigrationReport) -> Result<()> {
    tracing::debug!(sql = sql, "ddl");
    conn.execute_batch(sql).map_err(from_rusqlite)?;
    db::bump_user_version(conn)?;
    report.ddl_count += 1;
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "select 1 from sqlite_master where type = 'table' and name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    Ok(found.is_some())
}

fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "select 1 from sqlite_master where type = 'index' and name = ?1",
            [index],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    Ok(found.is_some())
}

/// Live column names, lowercased
pub fn live_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("select name from pragma_table_info(?1)")
        .map_err(from_rusqlite)?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(names.into_iter().map(|n| n.to_lowercase()).collect())
}
