//! Core Database Backend Traits
//!
//! This module defines the traits and value types the mapper talks to. Drivers
//! implement [`DatabasePool`] and [`DatabaseRow`]; everything above them only
//! sees [`DatabaseValue`]s and dialect-specific SQL text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult, OrmError, OrmResult};
use crate::sql::Returning;

/// Abstract database connection pool trait
///
/// Implementations must be safe to share between tasks; the mapper issues
/// independent single-statement round trips and never locks on its own.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// SQL dialect statements for this pool must be written in
    fn dialect(&self) -> SqlDialect;

    /// Execute a statement and return the affected rows count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute a query and return every result row
    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row
    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Option<Box<dyn DatabaseRow>>>;

    /// Execute an insert carrying a returning clause and hand back the returned value.
    ///
    /// The default reads the first column of the row produced by
    /// `RETURNING <pk>`. Drivers for dialects that return through an output
    /// bind (Oracle's `RETURNING .. INTO :n`) override this and read the
    /// parameter at `returning.out_position` instead.
    async fn execute_returning(
        &self,
        sql: &str,
        params: &[DatabaseValue],
        returning: &Returning,
    ) -> OrmResult<DatabaseValue> {
        let row = self.fetch_optional(sql, params).await?.ok_or_else(|| {
            OrmError::Query(format!("Insert returned no value for column '{}'", returning.column))
        })?;

        row.get_by_index(0)
    }

    /// Perform a health check on the pool
    async fn health_check(&self) -> OrmResult<Duration>;

    /// Get pool statistics
    fn stats(&self) -> DatabasePoolStats;

    /// Close the pool
    async fn close(&self) -> OrmResult<()>;
}

/// Database pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePoolStats {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
}

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by index
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue>;

    /// Get column count
    fn column_count(&self) -> usize;

    /// Get column names
    fn column_names(&self) -> Vec<String>;

    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        let index = self
            .column_names()
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| OrmError::Query(format!("Column '{}' not found", name)))?;

        self.get_by_index(index)
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Name of the variant, used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "NULL",
            DatabaseValue::Bool(_) => "Bool",
            DatabaseValue::Int32(_) => "Int32",
            DatabaseValue::Int64(_) => "Int64",
            DatabaseValue::Float64(_) => "Float64",
            DatabaseValue::String(_) => "String",
            DatabaseValue::Bytes(_) => "Bytes",
            DatabaseValue::Uuid(_) => "Uuid",
            DatabaseValue::DateTime(_) => "DateTime",
            DatabaseValue::Date(_) => "Date",
            DatabaseValue::Json(_) => "Json",
        }
    }

    /// Convert into a field type
    pub fn into_field<T: FromDatabaseValue>(self) -> ModelResult<T> {
        T::from_database_value(self)
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<Uuid> for DatabaseValue {
    fn from(value: Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<NaiveDate> for DatabaseValue {
    fn from(value: NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// Conversion from a column value into a field type.
///
/// The reverse of the `From<T> for DatabaseValue` impls. Drivers report the
/// database's native representation, so conversions accept the lossless
/// neighbours of the target type too (an `INTEGER` column read into `f64`,
/// a `TEXT` column holding a UUID, SQLite's 0/1 booleans).
pub trait FromDatabaseValue: Sized {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self>;
}

fn mismatch<T>(expected: &'static str, value: &DatabaseValue) -> ModelResult<T> {
    Err(ModelError::Conversion {
        column: String::new(),
        expected,
        found: value.type_name(),
    })
}

impl FromDatabaseValue for DatabaseValue {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        Ok(value)
    }
}

impl FromDatabaseValue for bool {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Bool(b) => Ok(b),
            DatabaseValue::Int32(i) => Ok(i != 0),
            DatabaseValue::Int64(i) => Ok(i != 0),
            other => mismatch("bool", &other),
        }
    }
}

impl FromDatabaseValue for i32 {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Int32(i) => Ok(i),
            DatabaseValue::Int64(i) => match i32::try_from(i) {
                Ok(narrowed) => Ok(narrowed),
                Err(_) => mismatch("i32", &DatabaseValue::Int64(i)),
            },
            other => mismatch("i32", &other),
        }
    }
}

impl FromDatabaseValue for i64 {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Int32(i) => Ok(i64::from(i)),
            DatabaseValue::Int64(i) => Ok(i),
            // NUMBER columns without scale come back as floats from some drivers
            DatabaseValue::Float64(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(f as i64)
            }
            other => mismatch("i64", &other),
        }
    }
}

impl FromDatabaseValue for f64 {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Float64(f) => Ok(f),
            DatabaseValue::Int32(i) => Ok(f64::from(i)),
            DatabaseValue::Int64(i) => Ok(i as f64),
            other => mismatch("f64", &other),
        }
    }
}

impl FromDatabaseValue for String {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::String(s) => Ok(s),
            other => mismatch("String", &other),
        }
    }
}

impl FromDatabaseValue for Vec<u8> {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Bytes(b) => Ok(b),
            other => mismatch("Vec<u8>", &other),
        }
    }
}

impl FromDatabaseValue for Uuid {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Uuid(u) => Ok(u),
            DatabaseValue::String(s) => match Uuid::parse_str(&s) {
                Ok(u) => Ok(u),
                Err(_) => mismatch("Uuid", &DatabaseValue::String(s)),
            },
            DatabaseValue::Bytes(b) => match Uuid::from_slice(&b) {
                Ok(u) => Ok(u),
                Err(_) => mismatch("Uuid", &DatabaseValue::Bytes(b)),
            },
            other => mismatch("Uuid", &other),
        }
    }
}

impl FromDatabaseValue for DateTime<Utc> {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::DateTime(dt) => Ok(dt),
            DatabaseValue::String(s) => {
                if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                    return Ok(dt.with_timezone(&Utc));
                }
                if let Ok(dt) = DateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f%:z") {
                    return Ok(dt.with_timezone(&Utc));
                }
                match NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f") {
                    Ok(naive) => Ok(naive.and_utc()),
                    Err(_) => mismatch("DateTime<Utc>", &DatabaseValue::String(s)),
                }
            }
            other => mismatch("DateTime<Utc>", &other),
        }
    }
}

impl FromDatabaseValue for NaiveDate {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Date(d) => Ok(d),
            DatabaseValue::DateTime(dt) => Ok(dt.date_naive()),
            DatabaseValue::String(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                Ok(d) => Ok(d),
                Err(_) => mismatch("NaiveDate", &DatabaseValue::String(s)),
            },
            other => mismatch("NaiveDate", &other),
        }
    }
}

impl FromDatabaseValue for JsonValue {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Json(j) => Ok(j),
            DatabaseValue::String(s) => match serde_json::from_str(&s) {
                Ok(j) => Ok(j),
                Err(_) => mismatch("serde_json::Value", &DatabaseValue::String(s)),
            },
            other => mismatch("serde_json::Value", &other),
        }
    }
}

impl<T: FromDatabaseValue> FromDatabaseValue for Option<T> {
    fn from_database_value(value: DatabaseValue) -> ModelResult<Self> {
        match value {
            DatabaseValue::Null => Ok(None),
            other => T::from_database_value(other).map(Some),
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    Oracle,
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Positional placeholder for the 1-based parameter `position`
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            SqlDialect::Oracle => format!(":{}", position),
            SqlDialect::PostgreSQL => format!("${}", position),
            SqlDialect::SQLite => format!("?{}", position),
        }
    }

    /// Expression that draws the next value from `sequence`.
    ///
    /// SQLite has no sequence objects; inserting NULL into an `INTEGER PRIMARY
    /// KEY` column makes the rowid allocator assign the identity instead.
    pub fn sequence_next_value(&self, sequence: &str) -> String {
        match self {
            SqlDialect::Oracle => format!("{}.NEXTVAL", sequence),
            SqlDialect::PostgreSQL => format!("nextval('{}')", sequence),
            SqlDialect::SQLite => "NULL".to_string(),
        }
    }

    /// Whether returned values travel through an output bind rather than a result row
    pub fn returns_into_output_bind(&self) -> bool {
        matches!(self, SqlDialect::Oracle)
    }

    /// Trailing clause returning `column` from an insert
    pub fn returning_clause(&self, column: &str, out_position: usize) -> String {
        if self.returns_into_output_bind() {
            format!(" RETURNING {} INTO {}", column, self.placeholder(out_position))
        } else {
            format!(" RETURNING {}", column)
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::Oracle => write!(f, "oracle"),
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}
