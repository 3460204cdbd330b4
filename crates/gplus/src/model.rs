//! Model metadata and typed column references.
//!
//! A [`Model`] describes its table once through [`ModelMeta`]; the
//! [`ModelRegistry`](crate::ModelRegistry) resolves and caches that description.
//! Queries refer to columns either by name or through a [`FieldRef`] taken from
//! `Model::fields()`, and both meet at the [`Column`] sum type.

use crate::row::FromRow;
use crate::value::Value;
use std::any::TypeId;
use std::fmt;

/// Static description of one struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    /// Rust field name.
    pub name: &'static str,
    /// Explicit column tag (`#[orm(column = "...")]`).
    pub column: Option<&'static str>,
    /// Tagged as the primary key (`#[orm(id)]`).
    pub primary_key: bool,
}

/// Static description of a record type, as produced by `#[derive(Model)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    /// Rust struct name.
    pub name: &'static str,
    /// Explicit table tag (`#[orm(table = "...")]`).
    pub table: Option<&'static str>,
    pub fields: Vec<FieldMeta>,
}

/// A record type persisted in one table.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Debug, Clone, FromRow, Model)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(id)]
///     id: i64,
///     name: String,
/// }
/// ```
pub trait Model: FromRow + Send + Sync + 'static {
    /// Companion struct holding one [`FieldRef`] per field.
    type Fields: Copy + Send + Sync + 'static;

    fn fields() -> Self::Fields;

    fn describe() -> ModelMeta;

    /// Field values in declaration order, matching `describe().fields`.
    fn values(&self) -> Vec<Value>;
}

/// Reference to a field of a specific model.
#[derive(Clone, Copy)]
pub struct FieldRef {
    model: TypeId,
    describe: fn() -> ModelMeta,
    field: &'static str,
}

impl FieldRef {
    pub fn of<M: Model>(field: &'static str) -> Self {
        Self {
            model: TypeId::of::<M>(),
            describe: M::describe,
            field,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub(crate) fn model(&self) -> TypeId {
        self.model
    }

    pub(crate) fn describe(&self) -> ModelMeta {
        (self.describe)()
    }
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model && self.field == other.field
    }
}

impl Eq for FieldRef {}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldRef").field(&self.field).finish()
    }
}

/// A column given either literally or as a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Name(String),
    Field(FieldRef),
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::Name(name.to_string())
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::Name(name)
    }
}

impl From<&String> for Column {
    fn from(name: &String) -> Self {
        Column::Name(name.clone())
    }
}

impl From<FieldRef> for Column {
    fn from(field: FieldRef) -> Self {
        Column::Field(field)
    }
}

impl From<&FieldRef> for Column {
    fn from(field: &FieldRef) -> Self {
        Column::Field(*field)
    }
}
