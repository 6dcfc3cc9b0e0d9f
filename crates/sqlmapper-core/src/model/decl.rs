//! Declarative model metadata
//!
//! A `ModelDecl<T>` is the input of the type catalog. It lists the fields,
//! relations and accessor methods of an entity type. Accessors are stored as
//! type-erased closures so that one declaration can carry fields of
//! different Rust types.

use super::entity::Entity;
use super::value::{FieldType, FieldValue, SemanticType};
use crate::compiler::relation::{bind_relation, RelationFactory};
use serde::Serialize;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Reads a column value out of an entity
pub type ColumnGetter<T> = Arc<dyn Fn(&T) -> FieldValue + Send + Sync>;

/// Writes a column value into an entity; `false` if the value has the wrong type
pub type ColumnSetter<T> = Arc<dyn Fn(&mut T, FieldValue) -> bool + Send + Sync>;

/// Reads a relation value; a single relation yields zero or one element
pub type RelationGetter<T, U> = Arc<dyn Fn(&T) -> Vec<U> + Send + Sync>;

/// Writes a relation value; a single relation receives zero or one element
pub type RelationSetter<T, U> = Arc<dyn Fn(&mut T, Vec<U>) + Send + Sync>;

pub(crate) type ErasedAccessor = Arc<dyn Any + Send + Sync>;

/// Declared visibility of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

/// How many targets a relation field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    Single,
    List,
    /// Collection de-duplicated by target primary key
    Set,
}

impl Cardinality {
    pub(crate) fn shape(&self) -> RelationShape {
        match self {
            Cardinality::Single => RelationShape::One,
            Cardinality::List | Cardinality::Set => RelationShape::Many,
        }
    }
}

/// Shape of a relation accessor's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    One,
    Many,
}

/// Typed accessor pair for one column
pub struct ColumnBinding<T> {
    pub semantic: SemanticType,
    pub get: ColumnGetter<T>,
    pub set: ColumnSetter<T>,
}

impl<T> Clone for ColumnBinding<T> {
    fn clone(&self) -> Self {
        Self {
            semantic: self.semantic,
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

pub(crate) fn column_getter<T, V, G>(get: G) -> ColumnGetter<T>
where
    V: FieldType,
    G: Fn(&T) -> V + Send + Sync + 'static,
{
    Arc::new(move |t: &T| get(t).to_field())
}

pub(crate) fn column_setter<T, V, S>(set: S) -> ColumnSetter<T>
where
    V: FieldType,
    S: Fn(&mut T, V) + Send + Sync + 'static,
{
    Arc::new(move |t: &mut T, value: FieldValue| match V::from_field(value) {
        Some(v) => {
            set(t, v);
            true
        }
        None => false,
    })
}

/// One persistable column of an entity
pub struct FieldDecl<T> {
    pub(crate) name: String,
    pub(crate) semantic: SemanticType,
    pub(crate) primary_key: bool,
    pub(crate) index: bool,
    pub(crate) column: Option<String>,
    pub(crate) visibility: Visibility,
    pub(crate) binding: Option<ColumnBinding<T>>,
}

impl<T: 'static> FieldDecl<T> {
    /// Declare a column whose Rust type is `V`
    pub fn column<V: FieldType>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            semantic: V::SEMANTIC,
            primary_key: false,
            index: false,
            column: None,
            visibility: Visibility::Private,
            binding: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Create a secondary index on this column
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Override the column name (defaults to the field name)
    pub fn named(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    /// Bind the accessor and mutator explicitly instead of by method name
    pub fn bind<V, G, S>(mut self, get: G, set: S) -> Self
    where
        V: FieldType,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.binding = Some(ColumnBinding {
            semantic: V::SEMANTIC,
            get: column_getter(get),
            set: column_setter(set),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn semantic(&self) -> SemanticType {
        self.semantic
    }

    pub(crate) fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Explicit accessor pair for a relation, erased over the target type
pub(crate) struct RelationAccessors {
    pub(crate) shape: RelationShape,
    pub(crate) get: ErasedAccessor,
    pub(crate) set: ErasedAccessor,
}

/// A field holding one or more related entities, resolved through a link field
pub struct RelationDecl<T> {
    pub(crate) name: String,
    pub(crate) cardinality: Cardinality,
    pub(crate) target: TypeId,
    pub(crate) target_name: &'static str,
    pub(crate) on: String,
    pub(crate) visibility: Visibility,
    pub(crate) binding: Option<RelationAccessors>,
    pub(crate) factory: RelationFactory<T>,
}

impl<T: Entity> RelationDecl<T> {
    fn with_cardinality<U: Entity>(
        name: impl Into<String>,
        on: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            cardinality,
            target: TypeId::of::<U>(),
            target_name: std::any::type_name::<U>(),
            on: on.into(),
            visibility: Visibility::Private,
            binding: None,
            factory: bind_relation::<T, U>,
        }
    }

    /// A single related entity whose key is held in field `on`
    pub fn one<U: Entity>(name: impl Into<String>, on: impl Into<String>) -> Self {
        Self::with_cardinality::<U>(name, on, Cardinality::Single)
    }

    /// An ordered list of related entities
    pub fn many<U: Entity>(name: impl Into<String>, on: impl Into<String>) -> Self {
        Self::with_cardinality::<U>(name, on, Cardinality::List)
    }

    /// A collection of related entities without duplicate keys
    pub fn set<U: Entity>(name: impl Into<String>, on: impl Into<String>) -> Self {
        Self::with_cardinality::<U>(name, on, Cardinality::Set)
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    /// Bind accessors for a single relation stored as `Option<U>`
    pub fn bind_one<U, G, S>(mut self, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Option<U> + Send + Sync + 'static,
        S: Fn(&mut T, Option<U>) + Send + Sync + 'static,
    {
        self.binding = Some(RelationAccessors {
            shape: RelationShape::One,
            get: Arc::new(one_getter(get)),
            set: Arc::new(one_setter(set)),
        });
        self
    }

    /// Bind accessors for a collection relation stored as `Vec<U>`
    pub fn bind_many<U, G, S>(mut self, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Vec<U> + Send + Sync + 'static,
        S: Fn(&mut T, Vec<U>) + Send + Sync + 'static,
    {
        let get: RelationGetter<T, U> = Arc::new(get);
        let set: RelationSetter<T, U> = Arc::new(set);
        self.binding = Some(RelationAccessors {
            shape: RelationShape::Many,
            get: Arc::new(get),
            set: Arc::new(set),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn one_getter<T, U, G>(get: G) -> RelationGetter<T, U>
where
    U: 'static,
    G: Fn(&T) -> Option<U> + Send + Sync + 'static,
{
    Arc::new(move |t: &T| get(t).into_iter().collect())
}

fn one_setter<T, U, S>(set: S) -> RelationSetter<T, U>
where
    U: 'static,
    S: Fn(&mut T, Option<U>) + Send + Sync + 'static,
{
    Arc::new(move |t: &mut T, value: Vec<U>| set(t, value.into_iter().next()))
}

/// Body of a declared method, as seen by accessor resolution
pub enum MethodBody<T> {
    Get {
        returns: SemanticType,
        get: ColumnGetter<T>,
    },
    Set {
        takes: SemanticType,
        set: ColumnSetter<T>,
    },
    GetRelation {
        target: &'static str,
        shape: RelationShape,
        get: ErasedAccessor,
    },
    SetRelation {
        target: &'static str,
        shape: RelationShape,
        set: ErasedAccessor,
    },
}

/// A method of the entity type, matched to fields by naming convention
pub struct MethodDecl<T> {
    pub(crate) name: String,
    pub(crate) is_static: bool,
    pub(crate) body: MethodBody<T>,
}

impl<T: 'static> MethodDecl<T> {
    pub fn getter<V, G>(name: impl Into<String>, get: G) -> Self
    where
        V: FieldType,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            is_static: false,
            body: MethodBody::Get {
                returns: V::SEMANTIC,
                get: column_getter(get),
            },
        }
    }

    pub fn setter<V, S>(name: impl Into<String>, set: S) -> Self
    where
        V: FieldType,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            is_static: false,
            body: MethodBody::Set {
                takes: V::SEMANTIC,
                set: column_setter(set),
            },
        }
    }

    pub fn ref_getter<U, G>(name: impl Into<String>, get: G) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            is_static: false,
            body: MethodBody::GetRelation {
                target: std::any::type_name::<U>(),
                shape: RelationShape::One,
                get: Arc::new(one_getter(get)),
            },
        }
    }

    pub fn refs_getter<U, G>(name: impl Into<String>, get: G) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Vec<U> + Send + Sync + 'static,
    {
        let get: RelationGetter<T, U> = Arc::new(get);
        Self {
            name: name.into(),
            is_static: false,
            body: MethodBody::GetRelation {
                target: std::any::type_name::<U>(),
                shape: RelationShape::Many,
                get: Arc::new(get),
            },
        }
    }

    pub fn ref_setter<U, S>(name: impl Into<String>, set: S) -> Self
    where
        U: Entity,
        S: Fn(&mut T, Option<U>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            is_static: false,
            body: MethodBody::SetRelation {
                target: std::any::type_name::<U>(),
                shape: RelationShape::One,
                set: Arc::new(one_setter(set)),
            },
        }
    }

    pub fn refs_setter<U, S>(name: impl Into<String>, set: S) -> Self
    where
        U: Entity,
        S: Fn(&mut T, Vec<U>) + Send + Sync + 'static,
    {
        let set: RelationSetter<T, U> = Arc::new(set);
        Self {
            name: name.into(),
            is_static: false,
            body: MethodBody::SetRelation {
                target: std::any::type_name::<U>(),
                shape: RelationShape::Many,
                set: Arc::new(set),
            },
        }
    }

    /// Mark as an associated (static) function; never used as an accessor
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Full declaration of an entity type
pub struct ModelDecl<T> {
    pub(crate) qualified_name: String,
    pub(crate) table: Option<String>,
    pub(crate) context: String,
    pub(crate) constructor: Option<fn() -> T>,
    pub(crate) fields: Vec<FieldDecl<T>>,
    pub(crate) relations: Vec<RelationDecl<T>>,
    pub(crate) transient: Vec<String>,
    pub(crate) methods: Vec<MethodDecl<T>>,
}

/// Logical database tag used when a model names none
pub const DEFAULT_CONTEXT: &str = "default";

impl<T: Entity> ModelDecl<T> {
    pub fn new() -> Self {
        Self {
            qualified_name: std::any::type_name::<T>().to_string(),
            table: None,
            context: DEFAULT_CONTEXT.to_string(),
            constructor: None,
            fields: Vec::new(),
            relations: Vec::new(),
            transient: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Override the table name (defaults to the lowercased type name)
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Logical database tag this entity lives in
    pub fn context(mut self, tag: impl Into<String>) -> Self {
        self.context = tag.into();
        self
    }

    /// No-argument constructor used to materialize rows
    pub fn constructor(mut self, ctor: fn() -> T) -> Self {
        self.constructor = Some(ctor);
        self
    }

    pub fn field(mut self, field: FieldDecl<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relation(mut self, relation: RelationDecl<T>) -> Self {
        self.relations.push(relation);
        self
    }

    /// A field that is never persisted
    pub fn transient(mut self, name: impl Into<String>) -> Self {
        self.transient.push(name.into());
        self
    }

    pub fn method(mut self, method: MethodDecl<T>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Table name after defaulting
    pub fn table_name(&self) -> String {
        match &self.table {
            Some(table) => table.clone(),
            None => default_table_name(&self.qualified_name),
        }
    }

    pub fn context_tag(&self) -> &str {
        &self.context
    }

    pub fn transient_fields(&self) -> &[String] {
        &self.transient
    }
}

impl<T: Entity + Default> ModelDecl<T> {
    /// Use `T::default` as the no-argument constructor
    pub fn default_constructor(self) -> Self {
        self.constructor(T::default)
    }
}

impl<T: Entity> Default for ModelDecl<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased last path segment, with generic arguments removed
pub fn default_table_name(qualified_name: &str) -> String {
    let base = qualified_name.split('<').next().unwrap_or(qualified_name);
    base.rsplit("::").next().unwrap_or(base).to_lowercase()
}
