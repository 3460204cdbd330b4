//! Execution contract between the engine and a database connection.
//!
//! The engine renders SQL and arguments; a [`Driver`] runs them. Plain clients,
//! transactions and pooled connections all implement it, so any of them can be
//! passed through the `db` option to make an operation join a transaction.

use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A connection that can run parameterized SQL.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run a statement that returns rows.
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64>;
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn convert(rows: Vec<tokio_postgres::Row>) -> OrmResult<Vec<Row>> {
    rows.iter().map(Row::from_pg).collect()
}

#[async_trait]
impl Driver for tokio_postgres::Client {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let rows = tokio_postgres::Client::query(self, sql, &params(args))
            .await
            .map_err(OrmError::from_db_error)?;
        convert(rows)
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        tokio_postgres::Client::execute(self, sql, &params(args))
            .await
            .map_err(OrmError::from_db_error)
    }
}

#[async_trait]
impl<'a> Driver for tokio_postgres::Transaction<'a> {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let rows = tokio_postgres::Transaction::query(self, sql, &params(args))
            .await
            .map_err(OrmError::from_db_error)?;
        convert(rows)
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, &params(args))
            .await
            .map_err(OrmError::from_db_error)
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl Driver for deadpool_postgres::Client {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper -> tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        Driver::query(client, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let client: &tokio_postgres::Client = self;
        Driver::execute(client, sql, args).await
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl<'a> Driver for deadpool_postgres::Transaction<'a> {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let tx: &tokio_postgres::Transaction<'a> = self;
        Driver::query(tx, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let tx: &tokio_postgres::Transaction<'a> = self;
        Driver::execute(tx, sql, args).await
    }
}

/// Each call checks a connection out of the pool for its duration.
#[cfg(feature = "pool")]
#[async_trait]
impl Driver for deadpool_postgres::Pool {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let client = self.get().await?;
        Driver::query(&client, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let client = self.get().await?;
        Driver::execute(&client, sql, args).await
    }
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for &D {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        (**self).query(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        (**self).execute(sql, args).await
    }
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Arc<D> {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        (**self).query(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        (**self).execute(sql, args).await
    }
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Box<D> {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        (**self).query(sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        (**self).execute(sql, args).await
    }
}
