//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL-specific implementation of the database
//! backend traits using sqlx as the underlying database driver.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::encode::IsNull;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgPoolOptions, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use tracing::{debug, error};

use super::core::*;
use crate::config::PoolConfig;
use crate::error::{ModelError, OrmResult};

/// PostgreSQL connection pool implementation
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: sqlx::PgPool,
}

impl PostgresPool {
    /// Create a pool for `database_url`
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .idle_timeout(config.idle_timeout.map(Duration::from_secs))
            .max_lifetime(config.max_lifetime.map(Duration::from_secs))
            .test_before_acquire(config.test_before_acquire)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!("Failed to create PostgreSQL pool: {}", e);
                ModelError::Connection(format!("Failed to create PostgreSQL pool: {}", e))
            })?;

        debug!(
            "PostgreSQL pool created (max={}, min={})",
            config.max_connections, config.min_connections
        );
        Ok(Self { pool })
    }

    /// Wrap an already configured sqlx pool
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying sqlx pool
    pub fn inner(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
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
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
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

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
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

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        postgres_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

/// NULL parameter without a declared type; the server infers it from the
/// column or expression the placeholder is used in.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

fn build_query<'q>(sql: &'q str, params: &[DatabaseValue]) -> Query<'q, Postgres, PgArguments> {
    // A cached statement keeps the parameter types it was first prepared
    // with, so statements carrying an inferred NULL are never cached.
    let persistent = !params.iter().any(DatabaseValue::is_null);

    params
        .iter()
        .fold(sqlx::query(sql).persistent(persistent), |query, value| {
            bind_database_value(query, value)
        })
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(UntypedNull),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> OrmResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(index)
        .map_err(|e| ModelError::database(format!("Failed to decode column {}", index), e))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| ModelError::database(format!("Failed to read column {}", index), e))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.column(index).type_info().name().to_string();
    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(decode(row, index)?),
        "INT2" => DatabaseValue::Int32(i32::from(decode::<i16>(row, index)?)),
        "INT4" => DatabaseValue::Int32(decode(row, index)?),
        "INT8" => DatabaseValue::Int64(decode(row, index)?),
        "FLOAT4" => DatabaseValue::Float64(f64::from(decode::<f32>(row, index)?)),
        "FLOAT8" => DatabaseValue::Float64(decode(row, index)?),
        "NUMERIC" => numeric_to_database_value(decode(row, index)?, index)?,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => DatabaseValue::String(decode(row, index)?),
        "BYTEA" => DatabaseValue::Bytes(decode(row, index)?),
        "UUID" => DatabaseValue::Uuid(decode(row, index)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(decode(row, index)?),
        "TIMESTAMP" => {
            DatabaseValue::DateTime(decode::<chrono::NaiveDateTime>(row, index)?.and_utc())
        }
        "DATE" => DatabaseValue::Date(decode(row, index)?),
        "JSON" | "JSONB" => DatabaseValue::Json(decode(row, index)?),
        other => {
            return Err(ModelError::Query(format!(
                "Unsupported PostgreSQL column type '{}' at index {}",
                other, index
            )))
        }
    };

    Ok(value)
}

/// Integral NUMERIC values stay exact as `Int64`, everything else becomes `Float64`
fn numeric_to_database_value(value: Decimal, index: usize) -> OrmResult<DatabaseValue> {
    let integral = if value.fract().is_zero() { value.to_i64() } else { None };
    if let Some(int) = integral {
        return Ok(DatabaseValue::Int64(int));
    }

    value.to_f64().map(DatabaseValue::Float64).ok_or_else(|| {
        ModelError::Query(format!(
            "NUMERIC value {} at index {} does not fit a double",
            value, index
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;
    use std::str::FromStr;

    #[test]
    fn test_statements_without_null_are_cached() {
        let params = [DatabaseValue::Int32(3), DatabaseValue::String("Lamp".into())];
        let query = build_query("INSERT INTO ITEMS (QTY, NAME) VALUES ($1, $2)", &params);

        assert!(Execute::persistent(&query));
    }

    #[test]
    fn test_null_parameter_disables_statement_cache() {
        let params = [DatabaseValue::Null, DatabaseValue::String("Lamp".into())];
        let query = build_query("INSERT INTO ITEMS (QTY, NAME) VALUES ($1, $2)", &params);

        assert!(!Execute::persistent(&query));
    }

    #[test]
    fn test_null_binds_without_type() {
        assert_eq!(
            <UntypedNull as sqlx::Type<Postgres>>::type_info(),
            PgTypeInfo::with_oid(Oid(0))
        );
        assert_ne!(
            <UntypedNull as sqlx::Type<Postgres>>::type_info(),
            <String as sqlx::Type<Postgres>>::type_info()
        );
    }

    #[test]
    fn test_numeric_with_fraction_becomes_double() {
        let value = numeric_to_database_value(Decimal::from_str("19.25").unwrap(), 2).unwrap();
        assert_eq!(value, DatabaseValue::Float64(19.25));
    }

    #[test]
    fn test_integral_numeric_stays_exact() {
        let value = numeric_to_database_value(Decimal::from_str("42.00").unwrap(), 0).unwrap();
        assert_eq!(value, DatabaseValue::Int64(42));

        let large = numeric_to_database_value(Decimal::from(i64::MAX), 0).unwrap();
        assert_eq!(large, DatabaseValue::Int64(i64::MAX));
    }

    #[test]
    fn test_integral_numeric_beyond_i64_falls_back_to_double() {
        let value = Decimal::from(i64::MAX) * Decimal::from(10);
        let converted = numeric_to_database_value(value, 0).unwrap();
        assert!(matches!(converted, DatabaseValue::Float64(f) if f > 9.0e18));
    }
}
