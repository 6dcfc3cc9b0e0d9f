//! Persistence context: one lazily opened connection per database tag
//!
//! State machine: CLOSED -> OPEN on first access, OPEN -> CLOSED on `close`,
//! `reopen` = close + restore the configured name + open.
//!
//! Two locks guard a context. The state lock is held for each statement (or
//! statement batch) and protects the connection handle. The writer lock is
//! held for a whole `update` block and around every mapper statement, so
//! no other thread can read or write through the connection while a
//! transaction is open on it. The writer lock is re-entrant: statements
//! issued by the block itself run straight away. It is always taken before
//! the state lock. `update` must not be nested on the same context.

#![allow(clippy::result_large_err)]

use crate::config::{ContextConfig, Storage};
use crate::db;
use crate::errors::{closed_connection, config_error, from_rusqlite, io_error, Result};
use parking_lot::ReentrantMutex;
use rusqlite::Connection;
use sqlmapper_core::errors::{OrmError, OrmErrorKind};
use sqlmapper_core::{log_op_end, log_op_error, log_op_start};
use sqlmapper_core_types::schema::{EVENT_RETRY, OP_UPDATE};
use sqlmapper_core_types::RequestId;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct ContextState {
    conn: Option<Connection>,
    /// Incremented on every open; statements prepared against an older
    /// generation belong to a closed connection
    generation: u64,
    name_override: Option<String>,
    user_id: Option<String>,
}

/// One logical database
pub struct SqliteContext {
    config: ContextConfig,
    state: Mutex<ContextState>,
    writer: ReentrantMutex<()>,
}

impl SqliteContext {
    pub fn new(config: ContextConfig) -> Self {
        let user_id = config.user_id.clone();
        Self {
            config,
            state: Mutex::new(ContextState {
                conn: None,
                generation: 0,
                name_override: None,
                user_id,
            }),
            writer: ReentrantMutex::new(()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ContextState>> {
        self.state.lock().map_err(|_| self.poisoned("state"))
    }

    fn poisoned(&self, which: &str) -> OrmError {
        OrmError::new(OrmErrorKind::Internal)
            .with_tag(self.config.tag.clone())
            .with_message(format!("context {} lock poisoned", which))
    }

    fn resolve_name(&self, state: &ContextState) -> Result<String> {
        if let Some(name) = state.name_override.as_ref().or(self.config.name.as_ref()) {
            return Ok(name.clone());
        }
        match &state.user_id {
            Some(user_id) => Ok(format!("user_{}", user_id)),
            None => Err(config_error(format!(
                "context '{}' has neither a name nor a user id",
                self.config.tag
            ))
            .with_tag(self.config.tag.clone())),
        }
    }

    fn resolve_path(&self, state: &ContextState) -> Result<PathBuf> {
        match &self.config.storage {
            Storage::Directory { path } => {
                std::fs::create_dir_all(path).map_err(|e| io_error("database_path", e))?;
                Ok(path.join(format!("{}.db", self.resolve_name(state)?)))
            }
            Storage::Memory => Err(config_error(format!(
                "context '{}' is in memory and has no file",
                self.config.tag
            ))
            .with_tag(self.config.tag.clone())),
        }
    }

    fn open_locked(&self, state: &mut ContextState) -> Result<()> {
        if state.conn.is_some() {
            return Ok(());
        }
        let conn = match &self.config.storage {
            Storage::Memory => db::open_in_memory()?,
            Storage::Directory { .. } => db::open(self.resolve_path(state)?)?,
        };
        db::configure(&conn, &self.config)?;
        state.conn = Some(conn);
        state.generation += 1;
        tracing::debug!(
            db_tag = %self.config.tag,
            generation = state.generation,
            "context opened"
        );
        Ok(())
    }

    fn close_locked(&self, state: &mut ContextState) -> Result<()> {
        if let Some(conn) = state.conn.take() {
            conn.close().map_err(|(_, e)| {
                from_rusqlite(e)
                    .with_op("close")
                    .with_tag(self.config.tag.clone())
            })?;
            tracing::debug!(db_tag = %self.config.tag, "context closed");
        }
        Ok(())
    }

    /// Drop the handle without waiting for a clean close
    fn force_close(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        if let Some(conn) = state.conn.take() {
            if let Err((conn, e)) = conn.close() {
                tracing::warn!(db_tag = %self.config.tag, error = %e, "forced close");
                drop(conn);
            }
        }
        Ok(())
    }

    /// Run `f` against the open connection, opening it first if needed
    ///
    /// `f` also receives the connection generation.
    ///
    /// # Errors
    ///
    /// Open failures, or whatever `f` returns.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection, u64) -> Result<R>) -> Result<R> {
        let mut state = self.lock_state()?;
        self.open_locked(&mut state)?;
        match &state.conn {
            Some(conn) => f(conn, state.generation),
            None => Err(closed_connection(&self.config.tag, "with_connection")),
        }
    }

    /// Run `f` inside the writer critical section
    ///
    /// Waits while another thread is inside `update`; on the thread running
    /// the `update` block it runs at once and joins that transaction.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _writer = self.writer.lock();
        f()
    }

    /// Run `sql` only if the connection of `generation` is still open
    fn control(&self, generation: u64, sql: &str, op: &str) -> Result<()> {
        let state = self.lock_state()?;
        match &state.conn {
            Some(conn) if state.generation == generation => conn
                .execute_batch(sql)
                .map_err(|e| from_rusqlite(e).with_op(op).with_tag(self.config.tag.clone())),
            _ => Err(closed_connection(&self.config.tag, op)),
        }
    }

    /// Open the connection if it is closed
    ///
    /// # Errors
    ///
    /// `Config` without a resolvable name, `Io` if the directory cannot be
    /// created, `Persistence` if the engine refuses the file.
    pub fn open(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        self.open_locked(&mut state)
    }

    /// Close the connection; a no-op when already closed
    ///
    /// # Errors
    ///
    /// `Persistence` if the engine fails to close cleanly.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        self.close_locked(&mut state)
    }

    /// Close, drop any name override and open again under the configured name
    ///
    /// # Errors
    ///
    /// See `close` and `open`.
    pub fn reopen(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        self.close_locked(&mut state)?;
        state.name_override = None;
        self.open_locked(&mut state)
    }

    /// Close and open a different database under this tag
    ///
    /// The override lasts until `reopen`.
    ///
    /// # Errors
    ///
    /// See `close` and `open`.
    pub fn open_named(&self, name: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        self.close_locked(&mut state)?;
        state.name_override = Some(name.to_string());
        self.open_locked(&mut state)
    }

    /// Switch the user whose database backs this tag
    ///
    /// Closes the connection when the user changes; the next access opens
    /// the new user's database.
    ///
    /// # Errors
    ///
    /// See `close`.
    pub fn set_user_id(&self, user_id: &str) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.user_id.as_deref() == Some(user_id) {
            return Ok(());
        }
        self.close_locked(&mut state)?;
        state.user_id = Some(user_id.to_string());
        Ok(())
    }

    /// Drop every cached prepared statement; a no-op when closed
    pub fn flush_statements(&self) {
        if let Ok(state) = self.lock_state() {
            if let Some(conn) = &state.conn {
                conn.flush_prepared_statement_cache();
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock_state().map(|s| s.conn.is_some()).unwrap_or(false)
    }

    /// File backing this context; creates the parent directory
    ///
    /// # Errors
    ///
    /// `Config` for in-memory storage or an unresolvable name, `Io` if the
    /// directory cannot be created.
    pub fn database_path(&self) -> Result<PathBuf> {
        let state = self.lock_state()?;
        self.resolve_path(&state)
    }

    /// Whether the database exists; in memory, whether it is open
    pub fn exists(&self) -> bool {
        match self.config.storage {
            Storage::Memory => self.is_open(),
            Storage::Directory { .. } => self
                .database_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Close and delete the database file
    ///
    /// Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// See `close`; `Io` if the file exists but cannot be removed.
    pub fn delete_file(&self) -> Result<bool> {
        let mut state = self.lock_state()?;
        self.close_locked(&mut state)?;
        if self.config.storage == Storage::Memory {
            return Ok(false);
        }
        let path = self.resolve_path(&state)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| io_error("delete_file", e))?;
        tracing::info!(db_tag = %self.config.tag, path = %path.display(), "database deleted");
        Ok(true)
    }

    /// Current `PRAGMA user_version`
    ///
    /// # Errors
    ///
    /// Open failures, or `Persistence` if the pragma fails.
    pub fn user_version(&self) -> Result<i64> {
        self.with_connection(|conn, _| db::user_version(conn))
    }

    /// Run `block` in a write transaction
    ///
    /// BEGIN, block, COMMIT; ROLLBACK on any failure. A lock-contention
    /// failure forces the connection closed, sleeps `lock_backoff_ms`,
    /// and runs the whole transaction once more on a fresh connection.
    ///
    /// # Errors
    ///
    /// The block's error, a lock-contention error on the second attempt, or
    /// `StatementState` if the connection was closed under the transaction.
    pub fn update<R>(&self, mut block: impl FnMut() -> Result<R>) -> Result<R> {
        let _writer = self.writer.lock();
        let request_id = RequestId::new();
        let tag = self.config.tag.as_str();
        let start = Instant::now();
        log_op_start!(OP_UPDATE, db_tag = tag, request_id = %request_id);

        let result = match self.attempt(&mut block, &request_id) {
            Err(err) if err.is_lock_contention() => {
                tracing::warn!(
                    op = OP_UPDATE,
                    event = EVENT_RETRY,
                    db_tag = tag,
                    request_id = %request_id,
                    backoff_ms = self.config.lock_backoff_ms,
                    "database locked, retrying once"
                );
                self.force_close()?;
                std::thread::sleep(Duration::from_millis(self.config.lock_backoff_ms));
                self.open()
                    .and_then(|_| self.attempt(&mut block, &request_id))
            }
            other => other,
        };

        match result {
            Ok(value) => {
                log_op_end!(
                    OP_UPDATE,
                    duration_ms = start.elapsed().as_millis() as u64,
                    db_tag = tag,
                    request_id = %request_id
                );
                Ok(value)
            }
            Err(err) => {
                let err = err.with_tag(tag).with_request_id(request_id);
                log_op_error!(
                    OP_UPDATE,
                    err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    db_tag = tag,
                    request_id = %request_id
                );
                Err(err)
            }
        }
    }

    fn attempt<R>(
        &self,
        block: &mut impl FnMut() -> Result<R>,
        request_id: &RequestId,
    ) -> Result<R> {
        let generation = self.with_connection(|conn, generation| {
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(|e| from_rusqlite(e).with_op("begin"))?;
            Ok(generation)
        })?;
        tracing::debug!(db_tag = %self.config.tag, request_id = %request_id, "begin");

        let outcome = block().and_then(|value| {
            self.control(generation, "COMMIT", "commit")?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                tracing::debug!(db_tag = %self.config.tag, request_id = %request_id, "commit");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.control(generation, "ROLLBACK", "rollback") {
                    tracing::debug!(
                        db_tag = %self.config.tag,
                        request_id = %request_id,
                        error = %rollback_err,
                        "rollback skipped"
                    );
                } else {
                    tracing::debug!(db_tag = %self.config.tag, request_id = %request_id, "rollback");
                }
                Err(err)
            }
        }
    }

    /// Run a read outside any transaction
    ///
    /// Failures are logged as `TransientQuery` and yield `R::default()`.
    pub fn query<R: Default>(&self, op: &str, block: impl FnOnce() -> Result<R>) -> R {
        match block() {
            Ok(value) => value,
            Err(err) => {
                let err = OrmError::new(OrmErrorKind::TransientQuery)
                    .with_op(op)
                    .with_tag(self.config.tag.clone())
                    .with_message(err.message().to_string())
                    .with_source(err);
                tracing::error!(
                    op = op,
                    db_tag = %self.config.tag,
                    err.kind = ?err.kind(),
                    err.code = err.code(),
                    message = %err,
                    "query failed"
                );
                R::default()
            }
        }
    }
}

impl std::fmt::Debug for SqliteContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteContext")
            .field("tag", &self.config.tag)
            .field("storage", &self.config.storage)
            .field("open", &self.is_open())
            .finish()
    }
}
