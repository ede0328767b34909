//! Executor configuration.
//!
//! The stores do not open connections themselves; this record is handed
//! to whatever statement engine implements `QueryExecutor`. Defaults and
//! environment variable names follow the original deployment convention.

use serde::Deserialize;

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "root".to_owned()
}

fn default_password() -> String {
    "root".to_owned()
}

fn default_database() -> String {
    "eventflow".to_owned()
}

fn default_connection_limit() -> u32 {
    5
}

fn default_charset() -> String {
    "UTF8_GENERAL_CI".to_owned()
}

fn default_timezone() -> String {
    "Z".to_owned()
}

/// Connection settings for the statement engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database user.
    #[serde(default = "default_user")]
    pub user: String,
    /// Database password.
    #[serde(default = "default_password")]
    pub password: String,
    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,
    /// Connection pool size limit.
    #[serde(default = "default_connection_limit")]
    pub connection_limit: u32,
    /// Connection character set.
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Session timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Whether the engine should log statements.
    #[serde(default)]
    pub debug: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            database: default_database(),
            connection_limit: default_connection_limit(),
            charset: default_charset(),
            timezone: default_timezone(),
            debug: false,
        }
    }
}

impl ExecutorConfig {
    /// Loads the configuration from `EVENTFLOW_DB_*` environment
    /// variables, falling back to the defaults for anything unset or
    /// unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let string_var = |name: &str| std::env::var(name).ok();
        Self {
            host: string_var("EVENTFLOW_DB_HOST").unwrap_or_else(default_host),
            port: string_var("EVENTFLOW_DB_PORT")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(default_port),
            user: string_var("EVENTFLOW_DB_USER").unwrap_or_else(default_user),
            password: string_var("EVENTFLOW_DB_PASS").unwrap_or_else(default_password),
            database: string_var("EVENTFLOW_DB_NAME").unwrap_or_else(default_database),
            connection_limit: string_var("EVENTFLOW_DB_CONNECTION_LIMIT")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(default_connection_limit),
            charset: string_var("EVENTFLOW_DB_CHARSET").unwrap_or_else(default_charset),
            timezone: string_var("EVENTFLOW_DB_TIMEZONE").unwrap_or_else(default_timezone),
            debug: string_var("EVENTFLOW_DB_DEBUG")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExecutorConfig;

    #[test]
    fn test_defaults_match_deployment_convention() {
        let config = ExecutorConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.database, "eventflow");
        assert_eq!(config.connection_limit, 5);
        assert_eq!(config.timezone, "Z");
        assert!(!config.debug);
    }

    #[test]
    fn test_deserializes_with_partial_fields() {
        let config: ExecutorConfig =
            serde_json::from_value(serde_json::json!({"host": "db.internal", "port": 3307}))
                .unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);
        assert_eq!(config.user, "root");
    }
}
