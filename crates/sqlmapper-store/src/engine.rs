//! Context registry: database tag -> persistence context

#![allow(clippy::result_large_err)]

use crate::config::{ContextConfig, OrmConfig};
use crate::context::SqliteContext;
use crate::errors::{config_error, Result};
use sqlmapper_core::errors::{OrmError, OrmErrorKind};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Every persistence context of one registry, keyed by tag
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: RwLock<HashMap<String, Arc<SqliteContext>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One context per configured tag
    ///
    /// # Errors
    ///
    /// `Config` if two contexts share a tag.
    pub fn from_config(config: &OrmConfig) -> Result<Self> {
        config.validate()?;
        let registry = Self::new();
        for context in &config.contexts {
            registry.insert(context.clone())?;
        }
        Ok(registry)
    }

    /// Add a context
    ///
    /// # Errors
    ///
    /// `Config` if the tag is already taken.
    pub fn insert(&self, config: ContextConfig) -> Result<Arc<SqliteContext>> {
        let mut contexts = self.write()?;
        if contexts.contains_key(&config.tag) {
            return Err(config_error(format!(
                "context '{}' is already registered",
                config.tag
            )));
        }
        let tag = config.tag.clone();
        let context = Arc::new(SqliteContext::new(config));
        contexts.insert(tag, context.clone());
        Ok(context)
    }

    /// The context for `tag`
    ///
    /// # Errors
    ///
    /// `UnknownContext` if no context is configured for `tag`.
    pub fn get(&self, tag: &str) -> Result<Arc<SqliteContext>> {
        self.read()?.get(tag).cloned().ok_or_else(|| {
            OrmError::new(OrmErrorKind::UnknownContext)
                .with_op("context_lookup")
                .with_tag(tag.to_string())
                .with_message("no context configured for this tag")
        })
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.read().map(|c| c.contains_key(tag)).unwrap_or(false)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        tags.sort();
        tags
    }

    /// Close every open context
    ///
    /// # Errors
    ///
    /// The first close failure; the remaining contexts are still closed.
    pub fn close_all(&self) -> Result<()> {
        let mut first_err = None;
        for context in self.read()?.values() {
            if let Err(e) = context.close() {
                tracing::warn!(db_tag = context.tag(), error = %e, "close failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SqliteContext>>>> {
        self.contexts.read().map_err(|_| poisoned())
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SqliteContext>>>> {
        self.contexts.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> OrmError {
    OrmError::new(OrmErrorKind::Internal).with_message("context registry lock poisoned")
}
