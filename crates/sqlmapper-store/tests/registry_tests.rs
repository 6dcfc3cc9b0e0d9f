#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{memory_registry, Author, Book, Person, PersonV1};
use sqlmapper_core::logging_facility::init_test_capture;
use sqlmapper_core::{Entity, FieldDecl, ModelDecl, OrmErrorKind};
use sqlmapper_store::{ContextConfig, ContextRegistry, OrmConfig, Registry};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
struct Keyless {
    id: i64,
}

impl Entity for Keyless {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .default_constructor()
            .field(FieldDecl::column::<i64>("id").bind(|e: &Keyless| e.id, |e, v| e.id = v))
    }
}

/// Lives in a database tag nobody configures by default
#[derive(Clone, Debug, Default, PartialEq)]
struct AuditEntry {
    id: i64,
    action: String,
}

impl Entity for AuditEntry {
    type Key = i64;

    fn model() -> ModelDecl<Self> {
        ModelDecl::new()
            .context("audit")
            .default_constructor()
            .field(
                FieldDecl::column::<i64>("id")
                    .primary_key()
                    .bind(|e: &AuditEntry| e.id, |e, v| e.id = v),
            )
            .field(
                FieldDecl::column::<String>("action")
                    .bind(|e: &AuditEntry| e.action.clone(), |e, v| e.action = v),
            )
    }
}

#[test]
fn test_schema_error_aborts_build() {
    let err = Registry::builder(OrmConfig::in_memory("default"))
        .register::<Person>()
        .register::<Keyless>()
        .build()
        .unwrap_err();

    assert_eq!(err.kind(), OrmErrorKind::MissingPrimaryKey);
}

#[test]
fn test_unregistered_relation_target_aborts_build() {
    let err = Registry::builder(OrmConfig::in_memory("default"))
        .register::<Book>()
        .build()
        .unwrap_err();

    assert_eq!(err.kind(), OrmErrorKind::UnresolvedRelationTarget);
}

#[test]
fn test_shared_table_aborts_build() {
    let err = Registry::builder(OrmConfig::in_memory("default"))
        .register::<Person>()
        .register::<PersonV1>()
        .build()
        .unwrap_err();

    assert_eq!(err.kind(), OrmErrorKind::DuplicateTable);
}

#[test]
fn test_unknown_mapper() {
    let registry = Registry::builder(OrmConfig::in_memory("default"))
        .register::<Person>()
        .build()
        .unwrap();

    let err = registry.mapper::<Author>().unwrap_err();

    assert_eq!(err.kind(), OrmErrorKind::UnknownMapper);
    assert_eq!(registry.len(), 1);
    assert!(!registry.is_empty());
}

#[test]
fn test_unconfigured_tag() {
    // Given an entity whose tag has no context
    let registry = Registry::builder(OrmConfig::in_memory("default"))
        .register::<AuditEntry>()
        .build()
        .unwrap();
    let audit = registry.mapper::<AuditEntry>().unwrap();

    // Then reads degrade, writes fail and prepare reports the tag
    assert!(audit.select().is_empty());
    assert_eq!(
        audit.save(&AuditEntry::default()).unwrap_err().kind(),
        OrmErrorKind::UnknownContext
    );
    let err = registry.prepare().unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::UnknownContext);
    assert_eq!(err.tag(), Some("audit"));
}

#[test]
fn test_entities_are_routed_by_tag() {
    let config = OrmConfig::in_memory("default").with_context(ContextConfig::in_memory("audit"));
    let registry = Registry::builder(config)
        .register::<Person>()
        .register::<AuditEntry>()
        .build()
        .unwrap();

    registry.prepare().unwrap();
    registry
        .mapper::<AuditEntry>()
        .unwrap()
        .save(&AuditEntry {
            id: 1,
            action: "login".to_string(),
        })
        .unwrap();

    let tables_in = |tag: &str| {
        registry
            .context(tag)
            .unwrap()
            .with_connection(|conn, _| sqlmapper_store::migrator::table_exists(conn, "auditentry"))
            .unwrap()
    };
    assert!(tables_in("audit"));
    assert!(!tables_in("default"));
    assert_eq!(registry.contexts().tags(), vec!["audit", "default"]);
}

#[test]
fn test_shared_contexts() {
    let contexts = Arc::new(ContextRegistry::new());
    contexts.insert(ContextConfig::in_memory("default")).unwrap();

    let first = Registry::builder(OrmConfig::default())
        .with_contexts(contexts.clone())
        .register::<Person>()
        .build()
        .unwrap();
    let second = Registry::builder(OrmConfig::default())
        .with_contexts(contexts)
        .register::<Person>()
        .build()
        .unwrap();

    first
        .mapper::<Person>()
        .unwrap()
        .save(&Person::default())
        .unwrap();

    assert_eq!(second.mapper::<Person>().unwrap().count(), 1);
}

#[test]
fn test_prepare_then_reset() {
    let registry = memory_registry();

    let reports = registry.prepare().unwrap();
    assert_eq!(reports.len(), registry.len());
    assert!(reports.iter().all(|r| r.created));

    registry.reset();

    // Tables survive a reset; only the bookkeeping is dropped
    let again = registry.prepare().unwrap();
    assert!(again.iter().all(|r| r.is_noop()));
}

#[test]
fn test_stats_in_registration_order() {
    let registry = memory_registry();
    let people = registry.mapper::<Person>().unwrap();
    people.save(&Person::default()).unwrap();
    people.get(0);

    let stats = registry.stats();

    assert_eq!(stats.len(), registry.len());
    assert!(stats[0].0.ends_with("Person"));
    assert_eq!(stats[0].1.writes, 1);
    assert_eq!(stats[0].1.queries, 1);
}

#[test]
fn test_manifest_lists_every_entity() {
    let registry = memory_registry();

    let manifest = registry.manifest().unwrap();

    let entities = manifest["entities"].as_array().unwrap();
    assert_eq!(entities.len(), registry.len());
    assert!(entities
        .iter()
        .any(|e| e["schema"]["table"] == "ts_person"));
}

#[test]
fn test_config_from_toml() {
    let dir = tempfile::TempDir::new().unwrap();
    let text = format!(
        r#"
        max_ref_depth = 1

        [[contexts]]
        tag = "default"

        [[contexts]]
        tag = "audit"
        user_id = "7"
        lock_backoff_ms = 5

        [contexts.storage]
        kind = "directory"
        path = '{}'
        "#,
        dir.path().display()
    );

    let config = OrmConfig::from_toml_str(&text).unwrap();
    let registry = Registry::builder(config)
        .register::<Person>()
        .build()
        .unwrap();

    assert_eq!(registry.config().max_ref_depth, 1);
    assert_eq!(registry.mapper::<Person>().unwrap().max_ref_depth(), 1);
    let audit = registry.context("audit").unwrap();
    assert_eq!(audit.config().lock_backoff_ms, 5);
    assert_eq!(audit.database_path().unwrap(), dir.path().join("user_7.db"));
}

#[test]
fn test_duplicate_tags_in_toml_are_rejected() {
    let text = r#"
        [[contexts]]
        tag = "default"

        [[contexts]]
        tag = "default"
    "#;

    let err = OrmConfig::from_toml_str(text).unwrap_err();

    assert_eq!(err.kind(), OrmErrorKind::Config);
}

#[test]
fn test_build_and_prepare_are_logged() {
    let capture = init_test_capture();
    let registry = memory_registry();

    registry.prepare().unwrap();

    capture.assert_event_exists("registry_build", "start");
    capture.assert_event_exists("registry_build", "end");
    capture.assert_event_exists("registry_prepare", "end");
}

#[test]
fn test_close_closes_every_context() {
    let registry = memory_registry();
    registry.prepare().unwrap();
    let ctx = registry.context("default").unwrap();
    assert!(ctx.is_open());

    registry.close().unwrap();

    assert!(!ctx.is_open());
}
