//! Declarative model metadata consumed by the type catalog

pub mod decl;
pub mod entity;
pub mod value;

pub use decl::{
    default_table_name, Cardinality, ColumnBinding, ColumnGetter, ColumnSetter, FieldDecl,
    MethodBody, MethodDecl, ModelDecl, RelationDecl, RelationGetter, RelationSetter,
    RelationShape, Visibility, DEFAULT_CONTEXT,
};
pub use entity::Entity;
pub use value::{FieldType, FieldValue, PrimaryKey, SemanticType};
