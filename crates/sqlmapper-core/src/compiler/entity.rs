//! Executable form of one entity: plan, constructor and bound accessors

use super::codec::{self, StoredValue};
use super::plan::MappingPlan;
use super::relation::RelationBinding;
use crate::catalog::schema::EntitySchema;
use crate::errors::{OrmError, OrmErrorKind, Result};
use crate::model::{ColumnBinding, Entity, PrimaryKey};
use std::sync::Arc;

pub struct CompiledEntity<T: Entity> {
    pub(crate) schema: EntitySchema,
    pub(crate) plan: MappingPlan,
    pub(crate) constructor: fn() -> T,
    /// In `plan.columns` order
    pub(crate) columns: Vec<ColumnBinding<T>>,
    /// In declaration order
    pub(crate) relations: Vec<Arc<dyn RelationBinding<T>>>,
}

impl<T: Entity> CompiledEntity<T> {
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn plan(&self) -> &MappingPlan {
        &self.plan
    }

    pub fn new_instance(&self) -> T {
        (self.constructor)()
    }

    pub fn relations(&self) -> &[Arc<dyn RelationBinding<T>>] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Arc<dyn RelationBinding<T>>> {
        self.relations.iter().find(|r| r.plan().name == name)
    }

    /// Primary key of `row`, widened to i64
    pub fn key_of(&self, row: &T) -> i64 {
        let binding = &self.columns[self.plan.primary_key];
        (binding.get)(row).as_i64().unwrap_or_default()
    }

    /// Typed primary key of `row`
    ///
    /// # Errors
    ///
    /// `Internal` if the stored key does not fit `T::Key`.
    pub fn typed_key_of(&self, row: &T) -> Result<T::Key> {
        let wide = self.key_of(row);
        T::Key::from_i64(wide).ok_or_else(|| {
            OrmError::new(OrmErrorKind::Internal)
                .with_entity(self.schema.qualified_name.clone())
                .with_message(format!("key {} does not fit the declared key type", wide))
        })
    }

    /// Parameters for the insert statement, in column order
    ///
    /// # Errors
    ///
    /// `Internal` if an accessor produced a value of the wrong type.
    pub fn bind_row(&self, row: &T) -> Result<Vec<StoredValue>> {
        self.plan
            .columns
            .iter()
            .zip(&self.columns)
            .map(|(column, binding)| {
                codec::bind(column.bind, &(binding.get)(row))
                    .map_err(|e| e.with_table(self.plan.table.clone()).with_field(column.field.clone()))
            })
            .collect()
    }

    /// Materialize a row from values in `select_fields` order
    ///
    /// # Errors
    ///
    /// `Decode` if a value does not fit its column's declared type.
    pub fn decode_row(&self, values: Vec<StoredValue>) -> Result<T> {
        if values.len() != self.columns.len() {
            return Err(OrmError::new(OrmErrorKind::Decode)
                .with_op("decode_row")
                .with_table(self.plan.table.clone())
                .with_message(format!(
                    "expected {} columns, got {}",
                    self.columns.len(),
                    values.len()
                )));
        }

        let mut row = self.new_instance();
        for ((column, binding), stored) in self.plan.columns.iter().zip(&self.columns).zip(values) {
            let value = codec::decode(column.decode, stored)
                .map_err(|e| e.with_table(self.plan.table.clone()).with_field(column.field.clone()))?;
            if !(binding.set)(&mut row, value) {
                return Err(OrmError::new(OrmErrorKind::Decode)
                    .with_op("decode_row")
                    .with_table(self.plan.table.clone())
                    .with_field(column.field.clone())
                    .with_message("mutator rejected the decoded value"));
            }
        }
        Ok(row)
    }
}
