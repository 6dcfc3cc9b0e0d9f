//! Validated, immutable description of an entity's persistent shape

use crate::model::{Cardinality, SemanticType};
use serde::Serialize;

/// One persistable column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub column: String,
    pub semantic: SemanticType,
    pub primary_key: bool,
    pub index: bool,
    pub accessor: String,
    pub mutator: String,
}

/// One relation field, resolved through a local link field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationSpec {
    pub name: String,
    pub cardinality: Cardinality,
    pub target: String,
    pub target_table: String,
    pub target_primary_key: String,
    pub link_field: String,
    pub link_type: SemanticType,
    pub accessor: String,
    pub mutator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySchema {
    pub qualified_name: String,
    pub table: String,
    pub tag: String,
    pub fields: Vec<FieldSpec>,
    /// Name of the primary key field
    pub primary_key: String,
    pub relations: Vec<RelationSpec>,
}

impl EntitySchema {
    /// Position of the primary key among `fields`
    pub fn primary_key_index(&self) -> usize {
        self.fields
            .iter()
            .position(|f| f.primary_key)
            .unwrap_or_default()
    }

    pub fn primary_key_field(&self) -> &FieldSpec {
        &self.fields[self.primary_key_index()]
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }
}
