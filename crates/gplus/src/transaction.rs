//! Transaction helper macro.
//!
//! `tokio_postgres::Transaction` and `deadpool_postgres::Transaction` implement
//! [`Driver`](crate::Driver), so engine operations join a transaction through
//! the `db` option:
//!
//! ```ignore
//! use gplus::{options, OrmResult};
//!
//! # async fn demo(engine: &gplus::Engine, client: &mut tokio_postgres::Client) -> OrmResult<()> {
//! gplus::transaction!(client, tx, {
//!     engine.insert(&order, [options::db(&tx)]).await?;
//!     engine.update_by_id(&stock, [options::db(&tx)]).await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `gplus::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err($crate::OrmError::from_db_error)?;

        let __gplus_tx_body_result = async { $body }.await;
        match __gplus_tx_body_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err($crate::OrmError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Rollback {
                    cause: ::std::boxed::Box::new(error),
                    rollback: rollback_err.to_string(),
                }),
            },
        }
    }};
}
