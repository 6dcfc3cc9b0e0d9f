//! Runtime configuration
//!
//! One `ContextConfig` per database tag. Loaded from TOML:
//!
//! ```toml
//! max_ref_depth = 3
//!
//! [[contexts]]
//! tag = "default"
//! user_id = "42"
//! lock_backoff_ms = 100
//!
//! [contexts.storage]
//! kind = "directory"
//! path = "/var/lib/app/db"
//! ```

use crate::errors::{config_error, Result};
use serde::Deserialize;
use sqlmapper_core::model::DEFAULT_CONTEXT;
use sqlmapper_core_types::Sensitive;
use std::path::PathBuf;

pub const DEFAULT_MAX_REF_DEPTH: usize = 3;
pub const DEFAULT_LOCK_BACKOFF_MS: u64 = 100;

/// Top-level configuration for a registry
#[derive(Debug, Clone, Deserialize)]
pub struct OrmConfig {
    /// Relation levels resolved by `wrap_ref` and saved by `save_with_ref`
    #[serde(default = "default_max_ref_depth")]
    pub max_ref_depth: usize,

    #[serde(default)]
    pub contexts: Vec<ContextConfig>,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            max_ref_depth: DEFAULT_MAX_REF_DEPTH,
            contexts: Vec::new(),
        }
    }
}

impl OrmConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// `Config` if the document is malformed or names a tag twice.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: OrmConfig =
            toml::from_str(text).map_err(|e| config_error(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with a single in-memory context for `tag`
    pub fn in_memory(tag: &str) -> Self {
        Self {
            contexts: vec![ContextConfig::in_memory(tag)],
            ..Self::default()
        }
    }

    /// Add or replace the context for `config.tag`
    pub fn with_context(mut self, config: ContextConfig) -> Self {
        self.contexts.retain(|c| c.tag != config.tag);
        self.contexts.push(config);
        self
    }

    pub fn with_max_ref_depth(mut self, depth: usize) -> Self {
        self.max_ref_depth = depth;
        self
    }

    /// # Errors
    ///
    /// `Config` if two contexts share a tag.
    pub fn validate(&self) -> Result<()> {
        for (i, context) in self.contexts.iter().enumerate() {
            if self.contexts[..i].iter().any(|c| c.tag == context.tag) {
                return Err(config_error(format!(
                    "context '{}' is configured more than once",
                    context.tag
                )));
            }
        }
        Ok(())
    }
}

/// Where a context keeps its database
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Storage {
    /// `<path>/<name>.db`
    Directory { path: PathBuf },
    /// Private in-memory database; lost on close
    #[default]
    Memory,
}

/// Configuration for one database tag
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Database name; `"user_" + user_id` when absent
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub storage: Storage,

    /// Encryption key, issued as `PRAGMA key` on open
    #[serde(default)]
    pub secret: Option<Sensitive<String>>,

    /// Sleep between a lock-contention failure and the retry
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,

    /// How long the engine itself waits on a locked database
    #[serde(default)]
    pub busy_timeout_ms: u64,
}

impl ContextConfig {
    pub fn in_memory(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            name: None,
            user_id: None,
            storage: Storage::Memory,
            secret: None,
            lock_backoff_ms: DEFAULT_LOCK_BACKOFF_MS,
            busy_timeout_ms: 0,
        }
    }

    pub fn in_directory(tag: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Storage::Directory { path: path.into() },
            ..Self::in_memory(tag)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Sensitive::new(secret.into()));
        self
    }

    pub fn with_lock_backoff_ms(mut self, ms: u64) -> Self {
        self.lock_backoff_ms = ms;
        self
    }
}

fn default_tag() -> String {
    DEFAULT_CONTEXT.to_string()
}

fn default_max_ref_depth() -> usize {
    DEFAULT_MAX_REF_DEPTH
}

fn default_lock_backoff_ms() -> u64 {
    DEFAULT_LOCK_BACKOFF_MS
}
