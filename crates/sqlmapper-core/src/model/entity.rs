use super::decl::ModelDecl;
use super::value::PrimaryKey;

/// A model type with a persistence mapping
///
/// # Example
///
/// ```
/// use sqlmapper_core::model::{Entity, FieldDecl, ModelDecl};
///
/// #[derive(Clone, Default)]
/// struct Tag {
///     id: i32,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     type Key = i32;
///
///     fn model() -> ModelDecl<Self> {
///         ModelDecl::new()
///             .table("tags")
///             .default_constructor()
///             .field(
///                 FieldDecl::column::<i32>("id")
///                     .primary_key()
///                     .bind(|t: &Tag| t.id, |t, v| t.id = v),
///             )
///             .field(
///                 FieldDecl::column::<String>("label")
///                     .bind(|t: &Tag| t.label.clone(), |t, v| t.label = v),
///             )
///     }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: PrimaryKey;

    fn model() -> ModelDecl<Self>;
}
