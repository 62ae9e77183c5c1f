//! SQLite Backend Implementation
//!
//! SQLite is dynamically typed, so column values are decoded from the storage
//! class of each value rather than from the declared column type.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, error};

use super::core::*;
use crate::config::PoolConfig;
use crate::error::{ModelError, OrmResult};

/// SQLite connection pool implementation
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: sqlx::SqlitePool,
}

impl SqlitePool {
    /// Create a pool for `database_url`.
    ///
    /// `sqlite::memory:` databases live only as long as their connection, so
    /// pair them with a single-connection [`PoolConfig`] without idle or
    /// lifetime limits.
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .idle_timeout(config.idle_timeout.map(Duration::from_secs))
            .max_lifetime(config.max_lifetime.map(Duration::from_secs))
            .test_before_acquire(config.test_before_acquire)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to create SQLite pool: {}", e);
                ModelError::Connection(format!("Failed to create SQLite pool: {}", e))
            })?;

        debug!("SQLite pool created for {}", database_url);
        Ok(Self { pool })
    }

    /// Wrap an already configured sqlx pool
    pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying sqlx pool
    pub fn inner(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let result = build_query(sql, params)
            .execute(&self.pool)
            .await
            .map_err(|e| ModelError::database("Query execution failed", e))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = build_query(sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModelError::database("Query fetch failed", e))?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(SqliteDbRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let row = build_query(sql, params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModelError::database("Query fetch failed", e))?;

        Ok(row.map(|r| Box::new(SqliteDbRow::new(r)) as Box<dyn DatabaseRow>))
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        let start = Instant::now();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ModelError::Connection(format!("Health check failed: {}", e)))?;

        Ok(start.elapsed())
    }

    fn stats(&self) -> DatabasePoolStats {
        let total = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DatabasePoolStats {
            total_connections: total,
            idle_connections: idle,
            active_connections: total.saturating_sub(idle),
        }
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// SQLite row implementation
pub struct SqliteDbRow {
    row: SqliteRow,
}

impl SqliteDbRow {
    pub fn new(row: SqliteRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for SqliteDbRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        sqlite_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

fn build_query<'q>(
    sql: &'q str,
    params: &[DatabaseValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_database_value(query, value))
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DatabaseValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(u.to_string()),
        DatabaseValue::DateTime(dt) => query.bind(dt.to_rfc3339()),
        DatabaseValue::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
        DatabaseValue::Json(j) => query.bind(j.to_string()),
    }
}

/// Convert a SQLite value to DatabaseValue based on its storage class
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ModelError::database(format!("Failed to read column {}", index), e))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" => DatabaseValue::Int64(decode(row, index)?),
        "REAL" => DatabaseValue::Float64(decode(row, index)?),
        "TEXT" => DatabaseValue::String(decode(row, index)?),
        "BLOB" => DatabaseValue::Bytes(decode(row, index)?),
        other => {
            return Err(ModelError::Query(format!(
                "Unsupported SQLite storage class '{}' at index {}",
                other, index
            )))
        }
    };

    Ok(value)
}

fn decode<'r, T>(row: &'r SqliteRow, index: usize) -> OrmResult<T>
where
    T: sqlx::Decode<'r, Sqlite>,
{
    row.try_get_unchecked(index)
        .map_err(|e| ModelError::database(format!("Failed to decode column {}", index), e))
}
