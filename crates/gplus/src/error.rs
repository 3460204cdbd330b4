//! Errors raised by the engine, the statement builder and the drivers.

use thiserror::Error;

pub type OrmResult<T> = Result<T, OrmError>;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

#[derive(Debug, Error)]
pub enum OrmError {
    /// The connection settings could not be turned into a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A driver error not mapped to a more specific variant.
    #[error("query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A single-row read matched nothing.
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    /// A column value could not be converted into the requested Rust type.
    #[error("cannot decode column `{column}`: {message}")]
    Decode { column: String, message: String },

    /// The statement was refused before reaching the database, e.g. a
    /// DELETE without WHERE or an update with no columns.
    #[error("invalid statement: {0}")]
    Validation(String),

    #[error("invalid database config: {0}")]
    Config(String),

    #[cfg(feature = "pool")]
    #[error("pool error: {0}")]
    Pool(String),

    /// The transaction body failed and the rollback failed too.
    #[error("{cause} (rollback failed: {rollback})")]
    Rollback { cause: Box<OrmError>, rollback: String },
}

impl OrmError {
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Any of the unique, foreign key or check violations.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation(_) | Self::ForeignKeyViolation(_) | Self::CheckViolation(_)
        )
    }

    /// Map a driver error, turning constraint SQLSTATEs into their variants.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        let Some(db_err) = err.as_db_error() else {
            return Self::Query(err);
        };
        let detail = format!(
            "{}: {}",
            db_err.constraint().unwrap_or("unknown"),
            db_err.message()
        );
        let constraint: Option<fn(String) -> Self> = match db_err.code().code() {
            UNIQUE_VIOLATION => Some(Self::UniqueViolation),
            FOREIGN_KEY_VIOLATION => Some(Self::ForeignKeyViolation),
            CHECK_VIOLATION => Some(Self::CheckViolation),
            _ => None,
        };
        match constraint {
            Some(variant) => variant(detail),
            None => Self::Query(err),
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
