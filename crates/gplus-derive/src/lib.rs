//! Derive macros for gplus
//!
//! Provides `#[derive(Model)]` and `#[derive(FromRow)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod from_row;
mod model;

/// Derive `FromRow` for a struct.
///
/// # Example
///
/// ```ignore
/// use gplus::FromRow;
///
/// #[derive(FromRow)]
/// struct UserName {
///     id: i64,
///     #[orm(column = "user_name")]
///     name: String,
/// }
/// ```
///
/// Columns default to the snake_case field name. A column missing from the
/// row decodes to the field type's zero value.
#[proc_macro_derive(FromRow, attributes(orm))]
pub fn derive_from_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    from_row::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Model` metadata for a struct.
///
/// # Example
///
/// ```ignore
/// use gplus::{FromRow, Model};
///
/// #[derive(Debug, Clone, FromRow, Model)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(id)]
///     id: i64,
///     name: String,
/// }
///
/// let fields = User::fields();
/// ```
///
/// # Generated
///
/// - `UserFields`: one `gplus::FieldRef` per field, usable wherever a column is expected
/// - `impl gplus::Model for User`: metadata, field references and row values
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - table name (defaults to the pluralized snake_case struct name)
/// - `#[orm(id)]` / `#[orm(primary_key)]` - mark the primary key
/// - `#[orm(column = "name")]` - map a field to a different column name
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
