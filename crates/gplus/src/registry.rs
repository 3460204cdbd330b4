//! Column resolution and the per-engine model metadata cache.

use crate::model::{Column, Model, ModelMeta};
use heck::ToSnakeCase;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One resolved column of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub field: &'static str,
    pub column: String,
    pub primary_key: bool,
}

/// Resolved physical layout of a model: table, columns and primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    pub name: &'static str,
    pub table: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_key: String,
}

impl ModelSchema {
    /// Resolve a model description.
    ///
    /// Columns fall back to the snake_case field name, the table to the
    /// pluralized snake_case struct name, and the primary key to
    /// `default_primary_key` when no field is tagged.
    pub fn resolve(meta: ModelMeta, default_primary_key: &str) -> Self {
        let columns: Vec<ColumnSchema> = meta
            .fields
            .iter()
            .map(|f| ColumnSchema {
                field: f.name,
                column: f
                    .column
                    .map_or_else(|| f.name.to_snake_case(), str::to_string),
                primary_key: f.primary_key,
            })
            .collect();

        let primary_key = columns
            .iter()
            .find(|c| c.primary_key)
            .map_or_else(|| default_primary_key.to_string(), |c| c.column.clone());

        Self {
            name: meta.name,
            table: meta
                .table
                .map_or_else(|| pluralize(&meta.name.to_snake_case()), str::to_string),
            columns,
            primary_key,
        }
    }

    /// Column for a Rust field name.
    pub fn column_of(&self, field: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.column.as_str())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.column.as_str())
    }

    /// Position of the primary key among the columns.
    pub fn primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.column == self.primary_key)
    }
}

fn pluralize(word: &str) -> String {
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

impl Column {
    /// Physical column name, resolved without a registry.
    ///
    /// Used where no engine is at hand, such as [`Function`](crate::Function).
    ///
    /// # Panics
    ///
    /// Same as [`ModelRegistry::resolve_column`].
    pub fn resolve(&self) -> String {
        match self {
            Column::Name(name) => name.clone(),
            Column::Field(field) => {
                let meta = field.describe();
                let name = meta.name;
                match meta.fields.into_iter().find(|f| f.name == field.field()) {
                    Some(f) => f.column.map_or_else(|| f.name.to_snake_case(), str::to_string),
                    None => panic!("field `{}` is not declared by model `{name}`", field.field()),
                }
            }
        }
    }
}

/// Thread-safe insert-once cache of [`ModelSchema`]s keyed by type identity.
///
/// Schemas are built lazily on first use. Concurrent first accesses may each
/// build a schema, but only the first insert is kept and every caller sees it.
/// Entries are never invalidated.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    schemas: Arc<RwLock<HashMap<TypeId, Arc<ModelSchema>>>>,
    default_primary_key: Arc<str>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new("id")
    }
}

impl ModelRegistry {
    pub fn new(default_primary_key: impl Into<Arc<str>>) -> Self {
        Self {
            schemas: Arc::new(RwLock::new(HashMap::new())),
            default_primary_key: default_primary_key.into(),
        }
    }

    pub fn default_primary_key(&self) -> &str {
        &self.default_primary_key
    }

    /// Resolved schema of `M`.
    pub fn schema<M: Model>(&self) -> Arc<ModelSchema> {
        self.schema_by(TypeId::of::<M>(), M::describe)
    }

    fn schema_by(&self, id: TypeId, describe: impl FnOnce() -> ModelMeta) -> Arc<ModelSchema> {
        if let Some(schema) = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Arc::clone(schema);
        }

        let built = Arc::new(ModelSchema::resolve(describe(), &self.default_primary_key));
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(schemas.entry(id).or_insert(built))
    }

    /// Primary key column of `M`.
    pub fn primary_key<M: Model>(&self) -> String {
        self.schema::<M>().primary_key.clone()
    }

    /// Table name of `M`.
    pub fn table<M: Model>(&self) -> String {
        self.schema::<M>().table.clone()
    }

    /// Physical column name for a [`Column`].
    ///
    /// # Panics
    ///
    /// Panics if a field reference names a field its model does not declare.
    /// Field references come from `Model::fields()`, so this only happens
    /// with a hand-written `Model` impl whose metadata is inconsistent.
    pub fn resolve_column(&self, column: &Column) -> String {
        match column {
            Column::Name(name) => name.clone(),
            Column::Field(field) => {
                let schema = self.schema_by(field.model(), || field.describe());
                match schema.column_of(field.field()) {
                    Some(column) => column.to_string(),
                    None => panic!(
                        "field `{}` is not declared by model `{}`",
                        field.field(),
                        schema.name
                    ),
                }
            }
        }
    }

    /// Resolve and comma-join a list of columns.
    pub fn join_columns(&self, columns: &[Column]) -> String {
        columns
            .iter()
            .map(|c| self.resolve_column(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
