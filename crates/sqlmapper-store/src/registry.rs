//! Registry: every mapper of one application, built once at startup
//!
//! ```no_run
//! # use sqlmapper_store::{OrmConfig, Registry};
//! # use sqlmapper_core::{Entity, FieldDecl, ModelDecl};
//! # #[derive(Clone, Default)]
//! # struct Person { id: i32 }
//! # impl Entity for Person {
//! #     type Key = i32;
//! #     fn model() -> ModelDecl<Self> {
//! #         ModelDecl::new().default_constructor().field(
//! #             FieldDecl::column::<i32>("id").primary_key().bind(|p: &Person| p.id, |p, v| p.id = v),
//! #         )
//! #     }
//! # }
//! # fn main() -> sqlmapper_store::Result<()> {
//! let registry = Registry::builder(OrmConfig::in_memory("default"))
//!     .register::<Person>()
//!     .build()?;
//! registry.prepare()?;
//!
//! let people = registry.mapper::<Person>()?;
//! people.save(&Person { id: 1 })?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::result_large_err)]

use crate::config::OrmConfig;
use crate::context::SqliteContext;
use crate::engine::ContextRegistry;
use crate::errors::Result;
use crate::mapper::{Mapper, MapperStats};
use crate::migrator::MigrationReport;
use sqlmapper_core::compiler::{RelatedLookup, RelatedStore};
use sqlmapper_core::errors::{OrmError, OrmErrorKind};
use sqlmapper_core::{log_op_end, log_op_error, log_op_start};
use sqlmapper_core::{Catalog, CompiledCatalog, Entity};
use sqlmapper_core_types::schema::{OP_REGISTRY_BUILD, OP_REGISTRY_PREPARE};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// Lifecycle operations shared by every mapper, whatever its entity type
pub trait MapperLifecycle: Send + Sync {
    fn entity_name(&self) -> &str;
    fn table(&self) -> &str;

    /// # Errors
    ///
    /// See `Mapper::prepare`.
    fn prepare(&self) -> Result<MigrationReport>;
    fn reset(&self);
    fn stats(&self) -> MapperStats;
}

impl<T: Entity> MapperLifecycle for Mapper<T> {
    fn entity_name(&self) -> &str {
        &self.plan().entity
    }

    fn table(&self) -> &str {
        Mapper::table(self)
    }

    fn prepare(&self) -> Result<MigrationReport> {
        Mapper::prepare(self)
    }

    fn reset(&self) {
        Mapper::reset(self)
    }

    fn stats(&self) -> MapperStats {
        Mapper::stats(self)
    }
}

struct RegisteredMapper {
    /// `Arc<Mapper<T>>`
    typed: Arc<dyn Any + Send + Sync>,
    /// `Arc<dyn RelatedStore<T>>`
    related: Arc<dyn Any + Send + Sync>,
    lifecycle: Arc<dyn MapperLifecycle>,
}

type PendingMapper = Box<dyn FnOnce(&Weak<Registry>) -> RegisteredMapper>;

type MapperFactory =
    fn(&CompiledCatalog, &Arc<ContextRegistry>, usize) -> Result<(TypeId, PendingMapper)>;

fn pending_mapper<T: Entity>(
    catalog: &CompiledCatalog,
    contexts: &Arc<ContextRegistry>,
    max_ref_depth: usize,
) -> Result<(TypeId, PendingMapper)> {
    let entity = catalog.entity::<T>().ok_or_else(|| {
        OrmError::new(OrmErrorKind::UnknownMapper)
            .with_op(OP_REGISTRY_BUILD)
            .with_entity(std::any::type_name::<T>())
            .with_message("entity missing from compiled catalog")
    })?;
    let contexts = contexts.clone();
    let make: PendingMapper = Box::new(move |registry: &Weak<Registry>| {
        let mapper = Arc::new(Mapper::new(entity, contexts, registry.clone(), max_ref_depth));
        let related: Arc<dyn RelatedStore<T>> = mapper.clone();
        RegisteredMapper {
            typed: mapper.clone(),
            related: Arc::new(related),
            lifecycle: mapper,
        }
    });
    Ok((TypeId::of::<T>(), make))
}

/// Collects entity types and configuration for `Registry::build`
pub struct RegistryBuilder {
    config: OrmConfig,
    contexts: Option<Arc<ContextRegistry>>,
    catalog: Catalog,
    factories: Vec<MapperFactory>,
}

impl RegistryBuilder {
    pub fn new(config: OrmConfig) -> Self {
        Self {
            config,
            contexts: None,
            catalog: Catalog::new(),
            factories: Vec::new(),
        }
    }

    /// Add an entity type
    pub fn register<T: Entity>(mut self) -> Self {
        self.catalog.register::<T>();
        self.factories.push(pending_mapper::<T>);
        self
    }

    /// Use existing contexts instead of building them from the config
    pub fn with_contexts(mut self, contexts: Arc<ContextRegistry>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    /// Compile the catalog and create one mapper per entity
    ///
    /// No database is touched; contexts open on first use or `prepare`.
    ///
    /// # Errors
    ///
    /// The first `SchemaError` of the catalog, or `Config` for a bad
    /// context configuration.
    pub fn build(self) -> Result<Arc<Registry>> {
        log_op_start!(OP_REGISTRY_BUILD, entities = self.factories.len());
        let start = Instant::now();

        let result = self.build_impl();
        match &result {
            Ok(registry) => {
                log_op_end!(
                    OP_REGISTRY_BUILD,
                    duration_ms = start.elapsed().as_millis() as u64,
                    entities = registry.len()
                );
            }
            Err(err) => {
                log_op_error!(
                    OP_REGISTRY_BUILD,
                    *err,
                    duration_ms = start.elapsed().as_millis() as u64
                );
            }
        }
        result
    }

    fn build_impl(self) -> Result<Arc<Registry>> {
        let contexts = match self.contexts {
            Some(contexts) => contexts,
            None => Arc::new(ContextRegistry::from_config(&self.config)?),
        };
        let catalog = self.catalog.compile()?;
        let max_ref_depth = self.config.max_ref_depth;

        let pending = self
            .factories
            .iter()
            .map(|factory| factory(&catalog, &contexts, max_ref_depth))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new_cyclic(|weak| {
            let mut mappers = HashMap::new();
            let mut order = Vec::with_capacity(pending.len());
            for (type_id, make) in pending {
                mappers.insert(type_id, make(weak));
                order.push(type_id);
            }
            Registry {
                config: self.config,
                contexts,
                catalog,
                mappers,
                order,
            }
        }))
    }
}

/// Entity type -> mapper, plus the contexts those mappers run on
pub struct Registry {
    config: OrmConfig,
    contexts: Arc<ContextRegistry>,
    catalog: CompiledCatalog,
    mappers: HashMap<TypeId, RegisteredMapper>,
    order: Vec<TypeId>,
}

impl Registry {
    pub fn builder(config: OrmConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    /// The mapper for `T`
    ///
    /// # Errors
    ///
    /// `UnknownMapper` if `T` was not registered.
    pub fn mapper<T: Entity>(&self) -> Result<Arc<Mapper<T>>> {
        self.mappers
            .get(&TypeId::of::<T>())
            .and_then(|m| m.typed.clone().downcast::<Mapper<T>>().ok())
            .ok_or_else(|| {
                OrmError::new(OrmErrorKind::UnknownMapper)
                    .with_op("mapper_lookup")
                    .with_entity(std::any::type_name::<T>())
                    .with_message("entity type is not registered")
            })
    }

    /// # Errors
    ///
    /// `UnknownContext` if no context is configured for `tag`.
    pub fn context(&self, tag: &str) -> Result<Arc<SqliteContext>> {
        self.contexts.get(tag)
    }

    pub fn contexts(&self) -> &Arc<ContextRegistry> {
        &self.contexts
    }

    pub fn catalog(&self) -> &CompiledCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// JSON description of every schema and its DDL
    ///
    /// # Errors
    ///
    /// `Internal` if serialization fails.
    pub fn manifest(&self) -> Result<serde_json::Value> {
        self.catalog.manifest()
    }

    /// Run `block` in a write transaction on the context for `tag`
    ///
    /// # Errors
    ///
    /// `UnknownContext`, or see `SqliteContext::update`.
    pub fn update<R>(&self, tag: &str, block: impl FnMut() -> Result<R>) -> Result<R> {
        self.context(tag)?.update(block)
    }

    /// Bind every mapper to its context and migrate its table
    ///
    /// Mappers are prepared in registration order; the first failure stops
    /// the run.
    ///
    /// # Errors
    ///
    /// The first mapper's `prepare` failure.
    pub fn prepare(&self) -> Result<Vec<MigrationReport>> {
        log_op_start!(OP_REGISTRY_PREPARE, entities = self.order.len());
        let start = Instant::now();

        let reports = self
            .lifecycles()
            .map(|m| m.prepare())
            .collect::<Result<Vec<_>>>()
            .map_err(|err| {
                log_op_error!(
                    OP_REGISTRY_PREPARE,
                    err,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                err
            })?;

        log_op_end!(
            OP_REGISTRY_PREPARE,
            duration_ms = start.elapsed().as_millis() as u64,
            ddl_count = reports.iter().map(|r| r.ddl_count).sum::<usize>()
        );
        Ok(reports)
    }

    /// Drop every mapper's cached statements and migration state
    pub fn reset(&self) {
        for mapper in self.lifecycles() {
            mapper.reset();
        }
        tracing::debug!(entities = self.order.len(), "registry reset");
    }

    /// Statement counters per entity, in registration order
    pub fn stats(&self) -> Vec<(String, MapperStats)> {
        self.lifecycles()
            .map(|m| (m.entity_name().to_string(), m.stats()))
            .collect()
    }

    /// Reset every mapper and close every context
    ///
    /// # Errors
    ///
    /// The first close failure.
    pub fn close(&self) -> Result<()> {
        self.reset();
        self.contexts.close_all()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn lifecycles(&self) -> impl Iterator<Item = &Arc<dyn MapperLifecycle>> {
        self.order
            .iter()
            .filter_map(|id| self.mappers.get(id).map(|m| &m.lifecycle))
    }
}

impl RelatedLookup for Registry {
    fn related(&self, target: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.mappers.get(&target).map(|m| m.related.clone())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.len())
            .field("tags", &self.contexts.tags())
            .finish()
    }
}
