//! Structural invariants of entity declarations
//!
//! Per-entity checks run on the raw `ModelDecl` before accessor resolution;
//! cross-entity checks run once every entity of a catalog is known.

use super::schema::EntitySchema;
use crate::errors::SchemaError;
use crate::model::{Entity, FieldType, ModelDecl, Visibility};
use std::collections::{HashMap, HashSet};

/// Field-level checks on a single declaration
///
/// # Errors
///
/// Returns the first violated rule, in this order: visibility, duplicate
/// names, empty entity, primary key, constructor, relation link fields.
pub fn check_declaration<T: Entity>(decl: &ModelDecl<T>) -> Result<(), SchemaError> {
    let entity = decl.qualified_name.clone();

    let public = decl
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.visibility))
        .chain(decl.relations.iter().map(|r| (r.name.as_str(), r.visibility)))
        .find(|(_, vis)| *vis == Visibility::Public);
    if let Some((field, _)) = public {
        return Err(SchemaError::NonPrivateField {
            entity,
            field: field.to_string(),
        });
    }

    let mut names = HashSet::new();
    for name in decl
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(decl.relations.iter().map(|r| r.name.as_str()))
    {
        if !names.insert(name) {
            return Err(SchemaError::DuplicateField {
                entity,
                field: name.to_string(),
            });
        }
    }

    let mut columns = HashSet::new();
    for field in &decl.fields {
        if !columns.insert(field.column_name()) {
            return Err(SchemaError::DuplicateColumn {
                entity,
                column: field.column_name().to_string(),
            });
        }
    }

    if decl.fields.is_empty() {
        return Err(SchemaError::EmptyEntity { entity });
    }

    check_primary_key(decl)?;

    if decl.constructor.is_none() {
        return Err(SchemaError::MissingDefaultConstructor { entity });
    }

    for relation in &decl.relations {
        let link = decl.fields.iter().find(|f| f.name == relation.on);
        match link {
            None => {
                return Err(SchemaError::UnresolvedLinkField {
                    entity,
                    relation: relation.name.clone(),
                    on: relation.on.clone(),
                })
            }
            Some(field) if !field.semantic.is_link_type() => {
                return Err(SchemaError::InvalidLinkFieldType {
                    entity,
                    relation: relation.name.clone(),
                    on: relation.on.clone(),
                    found: field.semantic.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    Ok(())
}

fn check_primary_key<T: Entity>(decl: &ModelDecl<T>) -> Result<(), SchemaError> {
    let entity = decl.qualified_name.clone();
    let keys: Vec<_> = decl.fields.iter().filter(|f| f.primary_key).collect();

    let pk = match keys.as_slice() {
        [] => return Err(SchemaError::MissingPrimaryKey { entity }),
        [pk] => pk,
        many => {
            return Err(SchemaError::MultiplePrimaryKeys {
                entity,
                fields: many.iter().map(|f| f.name.clone()).collect(),
            })
        }
    };

    if !pk.semantic.is_key_type() {
        return Err(SchemaError::InvalidPrimaryKeyType {
            entity,
            field: pk.name.clone(),
            found: pk.semantic.to_string(),
        });
    }

    let key_type = <T::Key as FieldType>::SEMANTIC;
    if pk.semantic != key_type {
        return Err(SchemaError::PrimaryKeyTypeMismatch {
            entity,
            field: pk.name.clone(),
            field_type: pk.semantic.to_string(),
            key_type: key_type.to_string(),
        });
    }

    Ok(())
}

/// No two entities of the same logical database may share a table
///
/// # Errors
///
/// `DuplicateTable` naming both entities.
pub fn check_unique_tables<'a>(
    schemas: impl IntoIterator<Item = &'a EntitySchema>,
) -> Result<(), SchemaError> {
    let mut seen: HashMap<(&str, &str), &str> = HashMap::new();
    for schema in schemas {
        let key = (schema.tag.as_str(), schema.table.as_str());
        if let Some(first) = seen.insert(key, schema.qualified_name.as_str()) {
            return Err(SchemaError::DuplicateTable {
                table: schema.table.clone(),
                tag: schema.tag.clone(),
                first: first.to_string(),
                second: schema.qualified_name.clone(),
            });
        }
    }
    Ok(())
}
