//! sqlmapper core - schema metadata compiler
//!
//! This crate turns declarative entity metadata into executable mapping plans:
//! - Declarative model metadata (`Entity`, `ModelDecl`, `FieldDecl`, `RelationDecl`)
//! - Type catalog and schema validator
//! - Mapping compiler (DDL, statement text, value codec)
//! - Relation resolution procedures
//! - Error and logging facilities shared with the store crate
//!
//! Nothing here touches a database; see `sqlmapper-store` for the runtime.

pub mod catalog;
pub mod compiler;
pub mod errors;
pub mod logging_facility;
pub mod model;

#[doc(hidden)]
pub use sqlmapper_core_types as core_types;

// Re-export commonly used types
pub use catalog::schema::{EntitySchema, FieldSpec, RelationSpec};
pub use catalog::{Catalog, CompiledCatalog};
pub use compiler::{CompiledEntity, MappingPlan, StoredValue};
pub use errors::{OrmError, OrmErrorKind, Result, SchemaError};
pub use model::{
    Cardinality, Entity, FieldDecl, FieldType, FieldValue, MethodDecl, ModelDecl, PrimaryKey,
    RelationDecl, SemanticType,
};
