use sqlmapper_core_types::RequestId;
use thiserror::Error;

/// Result type alias using OrmError
pub type Result<T> = std::result::Result<T, OrmError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Schema kinds are produced while building a registry and abort the build.
/// Runtime kinds come out of the persistence context and the mappers. Each kind
/// maps to a stable code usable in tests and log assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrmErrorKind {
    // Schema (build time, fatal)
    NonPrivateField,
    EmptyEntity,
    MissingPrimaryKey,
    MultiplePrimaryKeys,
    InvalidPrimaryKeyType,
    PrimaryKeyTypeMismatch,
    MissingDefaultConstructor,
    MissingAccessor,
    MissingMutator,
    AccessorTypeMismatch,
    DuplicateField,
    DuplicateColumn,
    UnresolvedLinkField,
    InvalidLinkFieldType,
    UnresolvedRelationTarget,
    DuplicateEntity,
    DuplicateTable,

    // Runtime
    /// The backing store reported it is locked by another writer
    LockContention,
    /// A non-transactional read failed; callers see an empty result
    TransientQuery,
    /// A statement ran against a connection that is no longer open
    StatementState,
    Persistence,
    /// A stored value could not be decoded into the declared field type
    Decode,
    Config,
    Io,
    UnknownContext,
    UnknownMapper,

    // Internal
    Internal,
}

impl OrmErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            OrmErrorKind::NonPrivateField => "ERR_SCHEMA_NON_PRIVATE_FIELD",
            OrmErrorKind::EmptyEntity => "ERR_SCHEMA_EMPTY_ENTITY",
            OrmErrorKind::MissingPrimaryKey => "ERR_SCHEMA_MISSING_PRIMARY_KEY",
            OrmErrorKind::MultiplePrimaryKeys => "ERR_SCHEMA_MULTIPLE_PRIMARY_KEYS",
            OrmErrorKind::InvalidPrimaryKeyType => "ERR_SCHEMA_INVALID_PRIMARY_KEY_TYPE",
            OrmErrorKind::PrimaryKeyTypeMismatch => "ERR_SCHEMA_PRIMARY_KEY_TYPE_MISMATCH",
            OrmErrorKind::MissingDefaultConstructor => "ERR_SCHEMA_MISSING_DEFAULT_CONSTRUCTOR",
            OrmErrorKind::MissingAccessor => "ERR_SCHEMA_MISSING_ACCESSOR",
            OrmErrorKind::MissingMutator => "ERR_SCHEMA_MISSING_MUTATOR",
            OrmErrorKind::AccessorTypeMismatch => "ERR_SCHEMA_ACCESSOR_TYPE_MISMATCH",
            OrmErrorKind::DuplicateField => "ERR_SCHEMA_DUPLICATE_FIELD",
            OrmErrorKind::DuplicateColumn => "ERR_SCHEMA_DUPLICATE_COLUMN",
            OrmErrorKind::UnresolvedLinkField => "ERR_SCHEMA_UNRESOLVED_LINK_FIELD",
            OrmErrorKind::InvalidLinkFieldType => "ERR_SCHEMA_INVALID_LINK_FIELD_TYPE",
            OrmErrorKind::UnresolvedRelationTarget => "ERR_SCHEMA_UNRESOLVED_RELATION_TARGET",
            OrmErrorKind::DuplicateEntity => "ERR_SCHEMA_DUPLICATE_ENTITY",
            OrmErrorKind::DuplicateTable => "ERR_SCHEMA_DUPLICATE_TABLE",
            OrmErrorKind::LockContention => "ERR_LOCK_CONTENTION",
            OrmErrorKind::TransientQuery => "ERR_TRANSIENT_QUERY",
            OrmErrorKind::StatementState => "ERR_STATEMENT_STATE",
            OrmErrorKind::Persistence => "ERR_PERSISTENCE",
            OrmErrorKind::Decode => "ERR_DECODE",
            OrmErrorKind::Config => "ERR_CONFIG",
            OrmErrorKind::Io => "ERR_IO",
            OrmErrorKind::UnknownContext => "ERR_UNKNOWN_CONTEXT",
            OrmErrorKind::UnknownMapper => "ERR_UNKNOWN_MAPPER",
            OrmErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for the build-time schema kinds
    pub fn is_schema(&self) -> bool {
        self.code().starts_with("ERR_SCHEMA_")
    }
}

/// Canonical structured error type
///
/// Carries a kind plus optional context (operation, entity, table, database
/// tag, field, transaction id) attached through the builder methods.
#[derive(Debug, Clone)]
pub struct OrmError {
    kind: OrmErrorKind,
    op: Option<String>,
    entity: Option<String>,
    table: Option<String>,
    tag: Option<String>,
    field: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<OrmError>>,
}

impl OrmError {
    /// Create a new error with the specified kind
    pub fn new(kind: OrmErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity: None,
            table: None,
            tag: None,
            field: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity (qualified type name) context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add logical database tag context
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add transaction correlation id
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: OrmError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> OrmErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity context, if any
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Get the table context, if any
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Get the database tag context, if any
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Get the field context, if any
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Get the transaction id, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&OrmError> {
        self.source.as_deref()
    }

    /// True if this is a lock-contention failure eligible for one retry
    pub fn is_lock_contention(&self) -> bool {
        self.kind == OrmErrorKind::LockContention
    }
}

impl std::fmt::Display for OrmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        if let Some(tag) = &self.tag {
            write!(f, " (db: {})", tag)?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {})", field)?;
        }
        Ok(())
    }
}

impl std::error::Error for OrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Build-time schema errors raised by the type catalog and validator
///
/// Any of these aborts the registry build; no mapper is created for a
/// catalog that produced one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{entity}: the fields of the model must be private (field {field})")]
    NonPrivateField { entity: String, field: String },

    #[error("{entity} must contain at least 1 persistable field")]
    EmptyEntity { entity: String },

    #[error("{entity} declares no primary key")]
    MissingPrimaryKey { entity: String },

    #[error("{entity} declares more than one primary key: {fields:?}")]
    MultiplePrimaryKeys { entity: String, fields: Vec<String> },

    #[error("{entity}: primary key {field} must be a 16/32/64-bit integer, found {found}")]
    InvalidPrimaryKeyType {
        entity: String,
        field: String,
        found: String,
    },

    #[error("{entity}: primary key {field} is {field_type} but the entity key type is {key_type}")]
    PrimaryKeyTypeMismatch {
        entity: String,
        field: String,
        field_type: String,
        key_type: String,
    },

    #[error("{entity}: a default constructor with no argument must be declared")]
    MissingDefaultConstructor { entity: String },

    #[error("{entity}: no getter found for fields {fields:?}")]
    MissingAccessor { entity: String, fields: Vec<String> },

    #[error("{entity}: no setter found for fields {fields:?}")]
    MissingMutator { entity: String, fields: Vec<String> },

    #[error("{entity}: method {method} does not match the type of field {field}: {reason}")]
    AccessorTypeMismatch {
        entity: String,
        field: String,
        method: String,
        reason: String,
    },

    #[error("{entity}: field {field} is declared more than once")]
    DuplicateField { entity: String, field: String },

    #[error("{entity}: column {column} is mapped by more than one field")]
    DuplicateColumn { entity: String, column: String },

    #[error("{entity}: relation {relation} links on unknown field '{on}'")]
    UnresolvedLinkField {
        entity: String,
        relation: String,
        on: String,
    },

    #[error("{entity}: relation {relation} links on {on} of type {found}; expected an integer or text field")]
    InvalidLinkFieldType {
        entity: String,
        relation: String,
        on: String,
        found: String,
    },

    #[error("{entity}: relation {relation} targets {target}, which is not registered")]
    UnresolvedRelationTarget {
        entity: String,
        relation: String,
        target: String,
    },

    #[error("{entity} is registered more than once")]
    DuplicateEntity { entity: String },

    #[error("table {table} in database '{tag}' is mapped by both {first} and {second}")]
    DuplicateTable {
        table: String,
        tag: String,
        first: String,
        second: String,
    },
}

impl SchemaError {
    /// The error kind this schema error maps to
    pub fn kind(&self) -> OrmErrorKind {
        match self {
            SchemaError::NonPrivateField { .. } => OrmErrorKind::NonPrivateField,
            SchemaError::EmptyEntity { .. } => OrmErrorKind::EmptyEntity,
            SchemaError::MissingPrimaryKey { .. } => OrmErrorKind::MissingPrimaryKey,
            SchemaError::MultiplePrimaryKeys { .. } => OrmErrorKind::MultiplePrimaryKeys,
            SchemaError::InvalidPrimaryKeyType { .. } => OrmErrorKind::InvalidPrimaryKeyType,
            SchemaError::PrimaryKeyTypeMismatch { .. } => OrmErrorKind::PrimaryKeyTypeMismatch,
            SchemaError::MissingDefaultConstructor { .. } => {
                OrmErrorKind::MissingDefaultConstructor
            }
            SchemaError::MissingAccessor { .. } => OrmErrorKind::MissingAccessor,
            SchemaError::MissingMutator { .. } => OrmErrorKind::MissingMutator,
            SchemaError::AccessorTypeMismatch { .. } => OrmErrorKind::AccessorTypeMismatch,
            SchemaError::DuplicateField { .. } => OrmErrorKind::DuplicateField,
            SchemaError::DuplicateColumn { .. } => OrmErrorKind::DuplicateColumn,
            SchemaError::UnresolvedLinkField { .. } => OrmErrorKind::UnresolvedLinkField,
            SchemaError::InvalidLinkFieldType { .. } => OrmErrorKind::InvalidLinkFieldType,
            SchemaError::UnresolvedRelationTarget { .. } => {
                OrmErrorKind::UnresolvedRelationTarget
            }
            SchemaError::DuplicateEntity { .. } => OrmErrorKind::DuplicateEntity,
            SchemaError::DuplicateTable { .. } => OrmErrorKind::DuplicateTable,
        }
    }

    /// The entity (or, for table clashes, the second entity) at fault
    pub fn entity(&self) -> &str {
        match self {
            SchemaError::NonPrivateField { entity, .. }
            | SchemaError::EmptyEntity { entity }
            | SchemaError::MissingPrimaryKey { entity }
            | SchemaError::MultiplePrimaryKeys { entity, .. }
            | SchemaError::InvalidPrimaryKeyType { entity, .. }
            | SchemaError::PrimaryKeyTypeMismatch { entity, .. }
            | SchemaError::MissingDefaultConstructor { entity }
            | SchemaError::MissingAccessor { entity, .. }
            | SchemaError::MissingMutator { entity, .. }
            | SchemaError::AccessorTypeMismatch { entity, .. }
            | SchemaError::DuplicateField { entity, .. }
            | SchemaError::DuplicateColumn { entity, .. }
            | SchemaError::UnresolvedLinkField { entity, .. }
            | SchemaError::InvalidLinkFieldType { entity, .. }
            | SchemaError::UnresolvedRelationTarget { entity, .. }
            | SchemaError::DuplicateEntity { entity } => entity,
            SchemaError::DuplicateTable { second, .. } => second,
        }
    }
}

impl From<SchemaError> for OrmError {
    fn from(err: SchemaError) -> Self {
        OrmError::new(err.kind())
            .with_op("catalog")
            .with_entity(err.entity().to_string())
            .with_message(err.to_string())
    }
}
