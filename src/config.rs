use crate::Error;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Default database holding the session table.
pub const DEFAULT_DATABASE_NAME: &str = "session_store";

/// Default session table name.
pub const DEFAULT_TABLE_NAME: &str = "sessions";

/// How long a record survives without being written or touched: 7 days.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Settings supplied by the hosting process.
///
/// Every field has a default, so a partial document (or none at all) is
/// enough:
///
/// ```rust
/// use sessionstore::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.database_name, "session_store");
/// assert_eq!(config.table_name, "sessions");
/// assert_eq!(config.max_attempts, 5);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub database_name: String,
    pub table_name: String,
    /// Retention window in seconds.
    pub retention_secs: u64,
    pub max_attempts: u32,
    /// Pause between two attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            retention_secs: DEFAULT_RETENTION.as_secs(),
            max_attempts: 5,
            retry_backoff_ms: 0,
        }
    }
}

impl StoreConfig {
    /// Reads the configuration from `SESSION_STORE_*` environment variables,
    /// keeping the default for every variable that is not set.
    ///
    /// | variable                         | field            |
    /// |----------------------------------|------------------|
    /// | `SESSION_STORE_DBNAME`           | `database_name`  |
    /// | `SESSION_STORE_DBTABLE`          | `table_name`     |
    /// | `SESSION_STORE_RETENTION_SECS`   | `retention_secs` |
    /// | `SESSION_STORE_MAX_ATTEMPTS`     | `max_attempts`   |
    /// | `SESSION_STORE_RETRY_BACKOFF_MS` | `retry_backoff_ms` |
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(name) = lookup("SESSION_STORE_DBNAME") {
            config.database_name = name;
        }
        if let Some(table) = lookup("SESSION_STORE_DBTABLE") {
            config.table_name = table;
        }
        if let Some(value) = lookup("SESSION_STORE_RETENTION_SECS") {
            config.retention_secs = parse_number("SESSION_STORE_RETENTION_SECS", &value)?;
        }
        if let Some(value) = lookup("SESSION_STORE_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("SESSION_STORE_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("SESSION_STORE_RETRY_BACKOFF_MS") {
            config.retry_backoff_ms = parse_number("SESSION_STORE_RETRY_BACKOFF_MS", &value)?;
        }
        Ok(config)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).backoff(Duration::from_millis(self.retry_backoff_ms))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value:?}: {e}")))
}
