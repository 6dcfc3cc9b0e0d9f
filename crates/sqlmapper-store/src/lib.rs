//! sqlmapper store - SQLite runtime for compiled entity mappings
//!
//! Provides:
//! - Configuration loaded from TOML (`OrmConfig`, `ContextConfig`)
//! - Persistence contexts: one lazily opened connection per database tag,
//!   with a lock-retrying `update` and an error-swallowing `query`
//! - Additive schema migrator
//! - `Mapper<T>`: CRUD, select, aggregates and batched relation resolution
//! - `Registry`: builds every mapper from one catalog and exposes
//!   bulk `prepare`/`reset`

pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod errors;
pub mod mapper;
pub mod migrator;
pub mod registry;
pub mod value;

// Re-export key types
pub use config::{ContextConfig, OrmConfig, Storage};
pub use context::SqliteContext;
pub use engine::ContextRegistry;
pub use errors::Result;
pub use mapper::{Mapper, MapperStats};
pub use migrator::MigrationReport;
pub use registry::{Registry, RegistryBuilder};
pub use rusqlite::{params, types::ToSql};
