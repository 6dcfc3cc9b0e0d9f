#![allow(clippy::unwrap_used, clippy::expect_used)]

use sqlmapper_core::errors::{OrmError, OrmErrorKind, SchemaError};
use sqlmapper_core_types::RequestId;

#[test]
fn test_every_kind_has_unique_stable_code() {
    let kinds = [
        OrmErrorKind::NonPrivateField,
        OrmErrorKind::EmptyEntity,
        OrmErrorKind::MissingPrimaryKey,
        OrmErrorKind::MultiplePrimaryKeys,
        OrmErrorKind::InvalidPrimaryKeyType,
        OrmErrorKind::PrimaryKeyTypeMismatch,
        OrmErrorKind::MissingDefaultConstructor,
        OrmErrorKind::MissingAccessor,
        OrmErrorKind::MissingMutator,
        OrmErrorKind::AccessorTypeMismatch,
        OrmErrorKind::DuplicateField,
        OrmErrorKind::DuplicateColumn,
        OrmErrorKind::UnresolvedLinkField,
        OrmErrorKind::InvalidLinkFieldType,
        OrmErrorKind::UnresolvedRelationTarget,
        OrmErrorKind::DuplicateEntity,
        OrmErrorKind::DuplicateTable,
        OrmErrorKind::LockContention,
        OrmErrorKind::TransientQuery,
        OrmErrorKind::StatementState,
        OrmErrorKind::Persistence,
        OrmErrorKind::Decode,
        OrmErrorKind::Config,
        OrmErrorKind::Io,
        OrmErrorKind::UnknownContext,
        OrmErrorKind::UnknownMapper,
        OrmErrorKind::Internal,
    ];

    let mut codes: Vec<&str> = kinds.iter().map(|k| k.code()).collect();
    assert!(codes.iter().all(|c| c.starts_with("ERR_")));
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), kinds.len());
}

#[test]
fn test_builder_carries_all_context() {
    let request_id = RequestId::new();
    let err = OrmError::new(OrmErrorKind::LockContention)
        .with_op("update")
        .with_entity("app::Person")
        .with_table("ts_person")
        .with_tag("default")
        .with_field("name")
        .with_request_id(request_id)
        .with_message("database is locked");

    assert!(err.is_lock_contention());
    assert_eq!(err.op(), Some("update"));
    assert_eq!(err.entity(), Some("app::Person"));
    assert_eq!(err.table(), Some("ts_person"));
    assert_eq!(err.tag(), Some("default"));
    assert_eq!(err.field(), Some("name"));
    assert_eq!(err.request_id(), Some(&request_id));
    assert_eq!(err.message(), "database is locked");
}

#[test]
fn test_schema_error_kinds_map_one_to_one() {
    let err = SchemaError::MissingAccessor {
        entity: "app::Task".to_string(),
        fields: vec!["title".to_string(), "done".to_string()],
    };
    assert_eq!(err.kind(), OrmErrorKind::MissingAccessor);

    let orm: OrmError = err.into();
    assert!(orm.kind().is_schema());
    assert!(orm.to_string().contains("title"));
    assert!(orm.to_string().contains("done"));
}

#[test]
fn test_duplicate_table_reports_second_entity() {
    let err = SchemaError::DuplicateTable {
        table: "users".to_string(),
        tag: "default".to_string(),
        first: "a::User".to_string(),
        second: "b::User".to_string(),
    };
    assert_eq!(err.entity(), "b::User");
    assert!(err.to_string().contains("a::User"));
}
