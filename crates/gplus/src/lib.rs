//! # gplus
//!
//! Typed query conditions and generic CRUD for Postgres.
//!
//! ## Features
//!
//! - **Condition builder**: [`QueryCond`] records predicates, groups and
//!   logical keywords as segments and lowers them to `?`-placeholder SQL
//! - **Field references**: columns come from struct fields via `#[derive(Model)]`
//!   and are resolved to column names through a cached [`ModelRegistry`]
//! - **Aggregates**: [`Function`] builds `SUM`/`AVG`/`MAX`/`MIN`/`COUNT`
//!   expressions and HAVING fragments
//! - **Generic CRUD**: [`Engine`] inserts, updates, deletes, counts, pages and
//!   plucks for any model, with per-call [`options`]
//! - **Safe defaults**: DELETE and UPDATE without WHERE are rejected
//! - **SQL logging**: every statement is traced on the `gplus.sql` target
//!
//! ## Example
//!
//! ```ignore
//! use gplus::{Engine, FromRow, Model, Page, QueryCond};
//!
//! #[derive(Debug, FromRow, Model)]
//! #[orm(table = "users")]
//! struct User {
//!     #[orm(id)]
//!     id: i64,
//!     username: String,
//!     age: i32,
//! }
//!
//! let engine = Engine::new(gplus::create_pool(&url)?);
//!
//! let (mut q, u) = QueryCond::<User>::with_fields();
//! q.eq(u.username, "alice").or().ge(u.age, 18);
//! let users = engine.select_list(&q, []).await?;
//!
//! let page = engine.select_page(Page::new(1, 20), &q, []).await?;
//! ```

extern crate self as gplus;

pub mod cond;
pub mod config;
pub mod dao;
pub mod driver;
pub mod error;
pub mod function;
mod log;
pub mod model;
pub mod options;
pub mod page;
pub mod registry;
pub mod row;
pub mod statement;
pub mod transaction;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub use cond::{Keyword, QueryCond, Segment, SortOrder};
pub use config::{DbConfig, EngineConfig};
pub use dao::Engine;
pub use driver::Driver;
pub use error::{OrmError, OrmResult};
pub use function::{Fragment, Function, as_};
pub use model::{Column, FieldMeta, FieldRef, Model, ModelMeta};
pub use options::{OptionFn, Options};
pub use page::Page;
pub use registry::{ColumnSchema, ModelRegistry, ModelSchema};
pub use row::{FromRow, FromValue, Row};
pub use statement::{BuiltQuery, Placeholder, Statement};
pub use value::Value;

#[cfg(feature = "pool")]
pub use pool::{
    create_pool, create_pool_from_config, create_pool_with_config, create_pool_with_manager_config,
};

#[cfg(feature = "derive")]
pub use gplus_derive::{FromRow, Model};

// Re-export tokio_postgres for convenience
pub use tokio_postgres;

#[cfg(feature = "pool")]
pub use deadpool_postgres;
