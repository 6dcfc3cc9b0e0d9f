//! Type catalog: analyzes entity declarations into validated schemas
//!
//! `Catalog::register::<T>()` runs the per-entity checks and resolves
//! accessors immediately; `Catalog::compile()` runs the cross-entity checks and
//! produces the immutable `CompiledCatalog`. A single failing rule aborts the
//! whole build.

pub mod resolve;
pub mod schema;
pub mod validate;

use crate::compiler::relation::RelationParts;
use crate::compiler::{self, CompiledEntity, MappingPlan, RelationBinding};
use crate::errors::{OrmError, OrmErrorKind, Result, SchemaError};
use crate::model::decl::{ColumnBinding, MethodBody, RelationShape};
use crate::model::{Entity, FieldDecl, ModelDecl, RelationDecl};
use crate::{log_op_end, log_op_error, log_op_start};
use resolve::{resolve_by_convention, synthesized_accessor, synthesized_mutator, Resolution};
use schema::{EntitySchema, FieldSpec, RelationSpec};
use sqlmapper_core_types::schema::OP_CATALOG_COMPILE;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

trait PendingEntity: Send {
    fn schema(&self) -> &EntitySchema;
    fn schema_mut(&mut self) -> &mut EntitySchema;
    /// Target type of each relation, aligned with `schema().relations`
    fn relation_targets(&self) -> &[TypeId];
    fn finish(self: Box<Self>) -> (Arc<dyn Any + Send + Sync>, MappingPlan, EntitySchema);
}

struct AnalyzedEntity<T: Entity> {
    schema: EntitySchema,
    targets: Vec<TypeId>,
    constructor: fn() -> T,
    columns: Vec<ColumnBinding<T>>,
    relations: Vec<Arc<dyn RelationBinding<T>>>,
}

impl<T: Entity> PendingEntity for AnalyzedEntity<T> {
    fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn schema_mut(&mut self) -> &mut EntitySchema {
        &mut self.schema
    }

    fn relation_targets(&self) -> &[TypeId] {
        &self.targets
    }

    fn finish(self: Box<Self>) -> (Arc<dyn Any + Send + Sync>, MappingPlan, EntitySchema) {
        let plan = compiler::compile(&self.schema);
        let schema = self.schema.clone();
        let compiled = CompiledEntity {
            schema: self.schema,
            plan: plan.clone(),
            constructor: self.constructor,
            columns: self.columns,
            relations: self.relations,
        };
        (Arc::new(compiled), plan, schema)
    }
}

/// Collects entity declarations for one registry build
#[derive(Default)]
pub struct Catalog {
    pending: Vec<(TypeId, Box<dyn PendingEntity>)>,
    error: Option<SchemaError>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze `T`'s declaration; the first failure is kept for `compile`
    pub fn register<T: Entity>(&mut self) -> &mut Self {
        if self.error.is_some() {
            return self;
        }

        let type_id = TypeId::of::<T>();
        let decl = T::model();
        if self.pending.iter().any(|(id, _)| *id == type_id) {
            self.error = Some(SchemaError::DuplicateEntity {
                entity: decl.qualified_name.clone(),
            });
            return self;
        }

        match analyze(decl) {
            Ok(entity) => {
                tracing::debug!(
                    entity = %entity.schema.qualified_name,
                    table = %entity.schema.table,
                    "entity registered"
                );
                self.pending.push((type_id, Box::new(entity)));
            }
            Err(err) => self.error = Some(err),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run cross-entity checks and compile every registered entity
    ///
    /// # Errors
    ///
    /// The first schema error raised by registration or by the cross-entity
    /// checks (`UnresolvedRelationTarget`, `DuplicateTable`).
    pub fn compile(self) -> Result<CompiledCatalog> {
        log_op_start!(OP_CATALOG_COMPILE, entities = self.pending.len());
        let start = Instant::now();

        let result = self.compile_impl().map_err(|e| {
            log_op_error!(
                OP_CATALOG_COMPILE,
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            OP_CATALOG_COMPILE,
            duration_ms = start.elapsed().as_millis() as u64,
            entities = result.schemas.len()
        );
        Ok(result)
    }

    fn compile_impl(mut self) -> Result<CompiledCatalog> {
        if let Some(err) = self.error.take() {
            return Err(err.into());
        }

        let targets: HashMap<TypeId, (String, String)> = self
            .pending
            .iter()
            .map(|(id, p)| {
                let schema = p.schema();
                (
                    *id,
                    (schema.table.clone(), schema.primary_key_field().column.clone()),
                )
            })
            .collect();

        for (_, pending) in self.pending.iter_mut() {
            let relation_targets = pending.relation_targets().to_vec();
            let schema = pending.schema_mut();
            for (spec, target) in schema.relations.iter_mut().zip(relation_targets) {
                let (table, pk) = targets.get(&target).ok_or_else(|| {
                    OrmError::from(SchemaError::UnresolvedRelationTarget {
                        entity: schema.qualified_name.clone(),
                        relation: spec.name.clone(),
                        target: spec.target.clone(),
                    })
                })?;
                spec.target_table = table.clone();
                spec.target_primary_key = pk.clone();
            }
        }

        validate::check_unique_tables(self.pending.iter().map(|(_, p)| p.schema()))?;

        let mut catalog = CompiledCatalog::default();
        for (type_id, pending) in self.pending {
            let (entity, plan, schema) = pending.finish();
            catalog.entities.insert(type_id, entity);
            catalog.order.push(type_id);
            catalog.plans.push(plan);
            catalog.schemas.push(schema);
        }
        Ok(catalog)
    }
}

/// Immutable result of a catalog build
#[derive(Default)]
pub struct CompiledCatalog {
    entities: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    order: Vec<TypeId>,
    schemas: Vec<EntitySchema>,
    plans: Vec<MappingPlan>,
}

impl std::fmt::Debug for CompiledCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCatalog")
            .field("order", &self.order)
            .field("schemas", &self.schemas)
            .field("plans", &self.plans)
            .finish_non_exhaustive()
    }
}

impl CompiledCatalog {
    /// The compiled form of `T`, if it was registered
    pub fn entity<T: Entity>(&self) -> Option<Arc<CompiledEntity<T>>> {
        let erased = self.entities.get(&TypeId::of::<T>())?.clone();
        erased.downcast::<CompiledEntity<T>>().ok()
    }

    pub fn contains<T: Entity>(&self) -> bool {
        self.entities.contains_key(&TypeId::of::<T>())
    }

    /// Registered types in registration order
    pub fn type_ids(&self) -> &[TypeId] {
        &self.order
    }

    /// Schemas in registration order
    pub fn schemas(&self) -> &[EntitySchema] {
        &self.schemas
    }

    pub fn plans(&self) -> &[MappingPlan] {
        &self.plans
    }

    pub fn schema(&self, qualified_name: &str) -> Option<&EntitySchema> {
        self.schemas
            .iter()
            .find(|s| s.qualified_name == qualified_name)
    }

    /// Distinct logical database tags, in first-use order
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for schema in &self.schemas {
            if !tags.contains(&schema.tag.as_str()) {
                tags.push(&schema.tag);
            }
        }
        tags
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// JSON description of every schema with its DDL and statements
    ///
    /// # Errors
    ///
    /// `Internal` if serialization fails.
    pub fn manifest(&self) -> Result<serde_json::Value> {
        let entities = self
            .schemas
            .iter()
            .zip(&self.plans)
            .map(|(schema, plan)| {
                Ok(serde_json::json!({
                    "schema": serde_json::to_value(schema).map_err(manifest_error)?,
                    "ddl": {
                        "create_table": plan.create_table_sql,
                        "create_index": plan.create_index_sql,
                    },
                    "statements": {
                        "insert": plan.insert_sql,
                        "delete": plan.delete_sql,
                        "get": plan.get_sql,
                    },
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::json!({ "entities": entities }))
    }
}

fn manifest_error(err: serde_json::Error) -> OrmError {
    OrmError::new(OrmErrorKind::Internal)
        .with_op("manifest")
        .with_message(err.to_string())
}

// ---------------------------------------------------------------------------
// Per-entity analysis
// ---------------------------------------------------------------------------

fn analyze<T: Entity>(decl: ModelDecl<T>) -> std::result::Result<AnalyzedEntity<T>, SchemaError> {
    validate::check_declaration(&decl)?;

    let entity = decl.qualified_name.clone();
    let expected: Vec<String> = decl
        .fields
        .iter()
        .filter(|f| f.binding.is_none())
        .map(|f| f.name.clone())
        .chain(
            decl.relations
                .iter()
                .filter(|r| r.binding.is_none())
                .map(|r| r.name.clone()),
        )
        .collect();
    let method_names: Vec<(&str, bool)> = decl
        .methods
        .iter()
        .map(|m| (m.name.as_str(), m.is_static))
        .collect();
    let resolution = resolve_by_convention(&method_names, &expected, &expected);

    if !resolution.missing_getters.is_empty() {
        return Err(SchemaError::MissingAccessor {
            entity,
            fields: resolution.missing_getters,
        });
    }
    if !resolution.missing_setters.is_empty() {
        return Err(SchemaError::MissingMutator {
            entity,
            fields: resolution.missing_setters,
        });
    }

    let mut fields = Vec::with_capacity(decl.fields.len());
    let mut columns = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        let (spec, binding) = bind_column(&decl, field, &resolution)?;
        fields.push(spec);
        columns.push(binding);
    }

    let mut relations = Vec::with_capacity(decl.relations.len());
    let mut bindings = Vec::with_capacity(decl.relations.len());
    let mut targets = Vec::with_capacity(decl.relations.len());
    for relation in &decl.relations {
        let (spec, binding) = bind_relation_field(&decl, relation, &fields, &columns, &resolution)?;
        relations.push(spec);
        bindings.push(binding);
        targets.push(relation.target);
    }

    let primary_key = fields
        .iter()
        .find(|f| f.primary_key)
        .map(|f| f.name.clone())
        .unwrap_or_default();
    let constructor = decl
        .constructor
        .ok_or_else(|| SchemaError::MissingDefaultConstructor {
            entity: entity.clone(),
        })?;

    Ok(AnalyzedEntity {
        schema: EntitySchema {
            qualified_name: entity,
            table: decl.table_name(),
            tag: decl.context.clone(),
            fields,
            primary_key,
            relations,
        },
        targets,
        constructor,
        columns,
        relations: bindings,
    })
}

fn bind_column<T: Entity>(
    decl: &ModelDecl<T>,
    field: &FieldDecl<T>,
    resolution: &Resolution,
) -> std::result::Result<(FieldSpec, ColumnBinding<T>), SchemaError> {
    let mismatch = |method: &str, reason: String| SchemaError::AccessorTypeMismatch {
        entity: decl.qualified_name.clone(),
        field: field.name.clone(),
        method: method.to_string(),
        reason,
    };

    let (binding, accessor, mutator) = match &field.binding {
        Some(binding) => {
            let accessor = synthesized_accessor(&field.name);
            if binding.semantic != field.semantic {
                return Err(mismatch(
                    &accessor,
                    format!("bound as {}, declared as {}", binding.semantic, field.semantic),
                ));
            }
            (binding.clone(), accessor, synthesized_mutator(&field.name))
        }
        None => {
            let getter = &decl.methods[resolution.getters[&field.name]];
            let setter = &decl.methods[resolution.setters[&field.name]];
            let get = match &getter.body {
                MethodBody::Get { returns, get } if *returns == field.semantic => get.clone(),
                MethodBody::Get { returns, .. } => {
                    return Err(mismatch(
                        &getter.name,
                        format!("returns {}, field is {}", returns, field.semantic),
                    ))
                }
                _ => {
                    return Err(mismatch(
                        &getter.name,
                        "is not a column getter".to_string(),
                    ))
                }
            };
            let set = match &setter.body {
                MethodBody::Set { takes, set } if *takes == field.semantic => set.clone(),
                MethodBody::Set { takes, .. } => {
                    return Err(mismatch(
                        &setter.name,
                        format!("takes {}, field is {}", takes, field.semantic),
                    ))
                }
                _ => {
                    return Err(mismatch(
                        &setter.name,
                        "is not a column setter".to_string(),
                    ))
                }
            };
            (
                ColumnBinding {
                    semantic: field.semantic,
                    get,
                    set,
                },
                getter.name.clone(),
                setter.name.clone(),
            )
        }
    };

    let spec = FieldSpec {
        name: field.name.clone(),
        column: field.column_name().to_string(),
        semantic: field.semantic,
        primary_key: field.primary_key,
        index: field.index,
        accessor,
        mutator,
    };
    Ok((spec, binding))
}

fn bind_relation_field<T: Entity>(
    decl: &ModelDecl<T>,
    relation: &RelationDecl<T>,
    fields: &[FieldSpec],
    columns: &[ColumnBinding<T>],
    resolution: &Resolution,
) -> std::result::Result<(RelationSpec, Arc<dyn RelationBinding<T>>), SchemaError> {
    let mismatch = |method: &str, reason: &str| SchemaError::AccessorTypeMismatch {
        entity: decl.qualified_name.clone(),
        field: relation.name.clone(),
        method: method.to_string(),
        reason: reason.to_string(),
    };

    // link field existence and type were checked by check_declaration
    let link_index = fields
        .iter()
        .position(|f| f.name == relation.on)
        .ok_or_else(|| SchemaError::UnresolvedLinkField {
            entity: decl.qualified_name.clone(),
            relation: relation.name.clone(),
            on: relation.on.clone(),
        })?;
    let link_type = fields[link_index].semantic;

    type Accessor = (Arc<dyn Any + Send + Sync>, RelationShape, String);
    let (getter, setter): (Accessor, Accessor) = match &relation.binding {
        Some(binding) => (
            (
                binding.get.clone(),
                binding.shape,
                synthesized_accessor(&relation.name),
            ),
            (
                binding.set.clone(),
                binding.shape,
                synthesized_mutator(&relation.name),
            ),
        ),
        None => {
            let getter = &decl.methods[resolution.getters[&relation.name]];
            let setter = &decl.methods[resolution.setters[&relation.name]];
            let get = match &getter.body {
                MethodBody::GetRelation { shape, get, .. } => {
                    (get.clone(), *shape, getter.name.clone())
                }
                _ => return Err(mismatch(&getter.name, "is not a relation getter")),
            };
            let set = match &setter.body {
                MethodBody::SetRelation { shape, set, .. } => {
                    (set.clone(), *shape, setter.name.clone())
                }
                _ => return Err(mismatch(&setter.name, "is not a relation setter")),
            };
            (get, set)
        }
    };

    let spec = RelationSpec {
        name: relation.name.clone(),
        cardinality: relation.cardinality,
        target: relation.target_name.to_string(),
        target_table: String::new(),
        target_primary_key: String::new(),
        link_field: relation.on.clone(),
        link_type,
        accessor: getter.2.clone(),
        mutator: setter.2.clone(),
    };

    let binding = (relation.factory)(RelationParts {
        entity: decl.qualified_name.clone(),
        spec: spec.clone(),
        link: columns[link_index].get.clone(),
        getter: getter.0,
        getter_shape: getter.1,
        getter_method: getter.2,
        setter: setter.0,
        setter_shape: setter.1,
        setter_method: setter.2,
    })?;

    Ok((spec, binding))
}
