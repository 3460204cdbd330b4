//! SQL logging on the `gplus.sql` tracing target.

use crate::config::EngineConfig;
use crate::error::OrmResult;
use std::time::Duration;

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

fn display_sql(config: &EngineConfig, sql: &str) -> String {
    match config.max_sql_length {
        Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
        _ => sql.to_string(),
    }
}

/// Emitted right before the statement is sent to the driver.
pub(crate) fn statement(config: &EngineConfig, op: &'static str, table: &str, sql: &str, param_count: usize) {
    tracing::debug!(
        target: "gplus.sql",
        op,
        table,
        param_count,
        sql = %display_sql(config, sql),
    );
}

/// Emitted after the driver returns: errors at ERROR, slow statements at WARN.
pub(crate) fn outcome<T>(
    config: &EngineConfig,
    op: &'static str,
    table: &str,
    sql: &str,
    elapsed: Duration,
    result: &OrmResult<T>,
) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match result {
        Err(error) => tracing::error!(
            target: "gplus.sql",
            op,
            table,
            elapsed_ms,
            error = %error,
            sql = %display_sql(config, sql),
        ),
        Ok(_) => {
            if config.slow_threshold.is_some_and(|threshold| elapsed >= threshold) {
                tracing::warn!(
                    target: "gplus.sql",
                    op,
                    table,
                    elapsed_ms,
                    sql = %display_sql(config, sql),
                    "slow statement",
                );
            }
        }
    }
}
