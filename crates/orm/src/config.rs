//! Database configuration
//!
//! Connection settings come from the environment (or from any deserializable
//! application config) and are turned into a live [`DatabasePool`] by
//! [`connect`]. Nothing here is global: the returned pool is handed to the
//! mapper explicitly.

use std::env;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

#[cfg(feature = "oracle")]
use crate::backends::OraclePool;
use crate::backends::{DatabaseBackendType, DatabasePool, PostgresPool, SqlitePool};
use crate::error::{ModelError, ModelResult};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a free connection
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    /// One connection that is never recycled, as `sqlite::memory:` requires
    pub fn single_connection() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            ..Self::default()
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: PoolConfig::default(),
        }
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `DATABASE_URL` wins when set. Otherwise the URL is assembled from
    /// `DB_DRIVER` (default `postgres`), `DB_USER` and `DB_PASSWORD` (default
    /// `DEV`), `DB_HOST` (default `localhost`), `DB_PORT` (backend default) and
    /// `DB_NAME` (`dev`, or `XEPDB1` for Oracle). With `DB_DRIVER=oracle` the
    /// `ORACLE_USER`, `ORACLE_PASS`, `ORACLE_HOST`, `ORACLE_PORT` and
    /// `ORACLE_SERVICE` variables fill any `DB_*` part left unset. Pool sizing
    /// reads `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS` and
    /// `DATABASE_ACQUIRE_TIMEOUT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`DatabaseConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => compose_url(&lookup)?,
        };

        let mut pool = PoolConfig::default();
        if let Some(value) = lookup("DATABASE_MAX_CONNECTIONS") {
            pool.max_connections = parse_number("DATABASE_MAX_CONNECTIONS", value)?;
        }
        if let Some(value) = lookup("DATABASE_MIN_CONNECTIONS") {
            pool.min_connections = parse_number("DATABASE_MIN_CONNECTIONS", value)?;
        }
        if let Some(value) = lookup("DATABASE_ACQUIRE_TIMEOUT") {
            pool.acquire_timeout = parse_number("DATABASE_ACQUIRE_TIMEOUT", value)?;
        }

        let config = Self { url, pool };
        config.validate()?;
        Ok(config)
    }

    /// Backend selected by the URL scheme
    pub fn backend_type(&self) -> Result<DatabaseBackendType, ConfigError> {
        DatabaseBackendType::from_url(&self.url).map_err(|reason| ConfigError::ValidationFailed {
            field: "url".to_string(),
            reason,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend_type()?;

        if self.pool.max_connections == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "max_connections".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pool.min_connections > self.pool.max_connections {
            return Err(ConfigError::ValidationFailed {
                field: "min_connections".to_string(),
                reason: format!(
                    "{} exceeds max_connections {}",
                    self.pool.min_connections, self.pool.max_connections
                ),
            });
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        expected: "a non-negative integer".to_string(),
    })
}

/// Read `key`, falling back to its `ORACLE_*` alias when composing an Oracle URL.
/// Empty values count as unset.
fn setting<F>(lookup: &F, key: &str, oracle_alias: Option<&str>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    read(key).or_else(|| oracle_alias.and_then(read))
}

fn compose_url<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let driver = setting(lookup, "DB_DRIVER", None).unwrap_or_else(|| "postgres".to_string());
    let backend: DatabaseBackendType = driver.parse().map_err(|_| ConfigError::InvalidValue {
        field: "DB_DRIVER".to_string(),
        value: driver.clone(),
        expected: "postgres, sqlite or oracle".to_string(),
    })?;

    let is_oracle = backend == DatabaseBackendType::Oracle;
    let alias = |name: &'static str| if is_oracle { Some(name) } else { None };

    let port = match backend.default_port() {
        Some(default_port) => match setting(lookup, "DB_PORT", alias("ORACLE_PORT")) {
            Some(value) => parse_number("DB_PORT", value)?,
            None => default_port,
        },
        None => {
            let name = setting(lookup, "DB_NAME", None).unwrap_or_else(|| ":memory:".to_string());
            return Ok(format!("sqlite:{}", name));
        }
    };

    let (scheme, default_name) = if is_oracle { ("oracle", "XEPDB1") } else { ("postgres", "dev") };
    let host = setting(lookup, "DB_HOST", alias("ORACLE_HOST"))
        .unwrap_or_else(|| "localhost".to_string());
    let user = setting(lookup, "DB_USER", alias("ORACLE_USER"))
        .unwrap_or_else(|| "DEV".to_string());
    let password = setting(lookup, "DB_PASSWORD", alias("ORACLE_PASS"))
        .unwrap_or_else(|| "DEV".to_string());
    let name = setting(lookup, "DB_NAME", alias("ORACLE_SERVICE"))
        .unwrap_or_else(|| default_name.to_string());

    let invalid = |field: &str, value: &str| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: "a value usable in a database URL".to_string(),
    };

    let mut url = Url::parse(&format!("{}://{}", scheme, host))
        .map_err(|_| invalid("DB_HOST", &host))?;
    url.set_username(&user).map_err(|_| invalid("DB_USER", &user))?;
    url.set_password(Some(&password)).map_err(|_| invalid("DB_PASSWORD", "***"))?;
    url.set_port(Some(port)).map_err(|_| invalid("DB_PORT", &port.to_string()))?;
    url.set_path(&format!("/{}", name));

    Ok(url.to_string())
}

/// Create the pool described by `config`.
///
/// Oracle needs the `oracle` cargo feature. Without it, Oracle URLs are still
/// recognised for dialect selection and `connect` reports a configuration
/// error; any other [`DatabasePool`] implementation can be handed to the
/// mapper directly.
pub async fn connect(config: &DatabaseConfig) -> ModelResult<Arc<dyn DatabasePool>> {
    config.validate()?;
    let backend = config.backend_type()?;
    debug!("Connecting to {} database", backend);

    let pool: Arc<dyn DatabasePool> = match backend {
        DatabaseBackendType::PostgreSQL => {
            Arc::new(PostgresPool::connect(&config.url, &config.pool).await?)
        }
        DatabaseBackendType::SQLite => {
            Arc::new(SqlitePool::connect(&config.url, &config.pool).await?)
        }
        #[cfg(feature = "oracle")]
        DatabaseBackendType::Oracle => {
            Arc::new(OraclePool::connect(&config.url, &config.pool).await?)
        }
        #[cfg(not(feature = "oracle"))]
        DatabaseBackendType::Oracle => {
            return Err(ModelError::Configuration(
                "oracle support is not compiled in; enable the `oracle` feature".to_string(),
            ))
        }
    };

    info!("Database pool ready ({} max connections)", config.pool.max_connections);
    Ok(pool)
}
