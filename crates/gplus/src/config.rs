//! Engine and database configuration.

use crate::error::{OrmError, OrmResult};
use crate::statement::Placeholder;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Primary key column for models without an `#[orm(id)]` field.
    pub primary_key: String,
    /// Rows per statement for `insert_batch`.
    pub batch_size: usize,
    /// Parameter syntax of the driver.
    pub placeholder: Placeholder,
    /// Statements slower than this are logged at WARN.
    pub slow_threshold: Option<Duration>,
    /// Truncate logged SQL to this many bytes.
    pub max_sql_length: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_key: "id".to_string(),
            batch_size: 1000,
            placeholder: Placeholder::Dollar,
            slow_threshold: Some(Duration::from_millis(200)),
            max_sql_length: Some(500),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback primary key column.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Set the default batch size; zero keeps the current value.
    pub fn batch_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.batch_size = size;
        }
        self
    }

    pub fn placeholder(mut self, style: Placeholder) -> Self {
        self.placeholder = style;
        self
    }

    /// Set the slow statement threshold.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// Disable slow statement warnings.
    pub fn no_slow_threshold(mut self) -> Self {
        self.slow_threshold = None;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log SQL without truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

/// Connection settings, typically deserialized from the application config.
///
/// Call [`DbConfig::validate`] before use to fill defaults and reject
/// incomplete settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Pool size.
    pub max_open_conns: usize,
    /// Session time zone.
    pub timezone: String,
    /// `disable`, `prefer` or `require`.
    pub ssl_mode: Option<String>,
    pub application_name: Option<String>,
}

impl DbConfig {
    pub const DEFAULT_PORT: u16 = 5432;
    pub const DEFAULT_MAX_OPEN_CONNS: usize = 200;
    pub const DEFAULT_TIMEZONE: &'static str = "UTC";

    /// Fill defaults and check required fields.
    pub fn validate(&mut self) -> OrmResult<()> {
        if self.user.is_empty() || self.password.is_empty() {
            return Err(OrmError::config("user and password must not be empty"));
        }
        if self.host.is_empty() {
            return Err(OrmError::config("host must not be empty"));
        }
        if self.database.is_empty() {
            return Err(OrmError::config("database must not be empty"));
        }
        if self.port == 0 {
            self.port = Self::DEFAULT_PORT;
        }
        if self.max_open_conns == 0 {
            self.max_open_conns = Self::DEFAULT_MAX_OPEN_CONNS;
        }
        if self.timezone.is_empty() {
            self.timezone = Self::DEFAULT_TIMEZONE.to_string();
        }
        if let Some(mode) = &self.ssl_mode {
            if !matches!(mode.as_str(), "disable" | "prefer" | "require") {
                return Err(OrmError::config(format!("unsupported ssl_mode `{mode}`")));
            }
        }
        Ok(())
    }

    /// `postgres://` connection URL.
    pub fn to_url(&self) -> String {
        let mut url = format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        );
        let mut query = Vec::new();
        if let Some(mode) = &self.ssl_mode {
            query.push(format!("sslmode={mode}"));
        }
        if let Some(name) = &self.application_name {
            query.push(format!("application_name={name}"));
        }
        if !self.timezone.is_empty() {
            query.push(format!("options=-c%20TimeZone%3D{}", self.timezone));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    /// Equivalent `tokio_postgres::Config`.
    pub fn pg_config(&self) -> OrmResult<tokio_postgres::Config> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.database);
        if let Some(name) = &self.application_name {
            config.application_name(name);
        }
        if !self.timezone.is_empty() {
            config.options(&format!("-c TimeZone={}", self.timezone));
        }
        if let Some(mode) = &self.ssl_mode {
            config.ssl_mode(match mode.as_str() {
                "disable" => tokio_postgres::config::SslMode::Disable,
                "prefer" => tokio_postgres::config::SslMode::Prefer,
                "require" => tokio_postgres::config::SslMode::Require,
                other => return Err(OrmError::config(format!("unsupported ssl_mode `{other}`"))),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DbConfig {
        serde_json::from_str(
            r#"{"host": "db", "user": "app", "password": "secret", "database": "shop"}"#,
        )
        .unwrap()
    }

    #[test]
    fn validate_fills_defaults() {
        let mut config = base();
        config.validate().unwrap();
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_open_conns, 200);
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let mut config = base();
        config.password.clear();
        assert!(matches!(config.validate(), Err(OrmError::Config(_))));

        let mut config = base();
        config.database.clear();
        assert!(matches!(config.validate(), Err(OrmError::Config(_))));

        let mut config = base();
        config.ssl_mode = Some("verify".into());
        assert!(matches!(config.validate(), Err(OrmError::Config(_))));
    }

    #[test]
    fn url_includes_options() {
        let mut config = base();
        config.ssl_mode = Some("require".into());
        config.validate().unwrap();
        assert_eq!(
            config.to_url(),
            "postgres://app:secret@db:5432/shop?sslmode=require&options=-c%20TimeZone%3DUTC"
        );
    }

    #[test]
    fn pg_config_carries_credentials() {
        let mut config = base();
        config.validate().unwrap();
        let pg = config.pg_config().unwrap();
        assert_eq!(pg.get_user(), Some("app"));
        assert_eq!(pg.get_dbname(), Some("shop"));
        assert_eq!(pg.get_ports(), &[5432]);
    }

    #[test]
    fn engine_config_builder() {
        let config = EngineConfig::new()
            .primary_key("uid")
            .batch_size(0)
            .placeholder(Placeholder::Question)
            .no_slow_threshold();
        assert_eq!(config.primary_key, "uid");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.placeholder, Placeholder::Question);
        assert!(config.slow_threshold.is_none());
    }
}
