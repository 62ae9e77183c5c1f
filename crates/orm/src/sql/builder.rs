//! Statement builder for the mapper operations

use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::{ModelError, ModelResult};
use crate::metadata::EntityMetadata;
use crate::security::{validate_identifier, validate_table_name};

use super::{Returning, Statement};

/// Builds dialect-specific statements from entity metadata.
///
/// Placeholders are numbered by a counter that only advances when a value is
/// bound, so a sequence-backed primary key never consumes a position.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    dialect: SqlDialect,
    schema: Option<String>,
}

impl StatementBuilder {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            schema: None,
        }
    }

    /// Qualify sequence names that carry no schema of their own with `schema`
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// `INSERT` of every mapped column.
    ///
    /// A sequence-backed primary key is filled by the dialect's next-value
    /// expression; any other primary key must carry a value.
    pub fn insert<T>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        entity: &T,
    ) -> ModelResult<Statement> {
        let (sql, params, _) = self.build_insert_sql(table, metadata, entity)?;
        Ok(Statement::new(sql, params))
    }

    /// `INSERT` followed by the dialect's returning clause for the primary key
    pub fn insert_returning_id<T>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        entity: &T,
    ) -> ModelResult<Statement> {
        let pk = metadata.require_primary_key("Insert returning id")?;
        let (mut sql, params, param_counter) = self.build_insert_sql(table, metadata, entity)?;

        sql.push_str(&self.dialect.returning_clause(&pk.column, param_counter));

        Ok(Statement {
            sql,
            params,
            returning: Some(Returning {
                column: pk.column.clone(),
                out_position: param_counter,
            }),
        })
    }

    /// `UPDATE` of every non-key column, matched on the primary key
    pub fn update<T>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        entity: &T,
    ) -> ModelResult<Statement> {
        let pk = metadata.require_primary_key("Update")?;
        validate_table_name(table)?;

        let mut sql = format!("UPDATE {} SET ", table);
        let mut params = Vec::new();
        let mut param_counter = 1;

        for (index, column) in metadata.columns().iter().enumerate() {
            if column.is_primary_key {
                continue;
            }
            if param_counter > 1 {
                sql.push_str(", ");
            }
            let placeholder = self.dialect.placeholder(param_counter);
            sql.push_str(&format!("{} = {}", column.column, placeholder));
            params.push(metadata.value_of(entity, index));
            param_counter += 1;
        }

        if params.is_empty() {
            return Err(ModelError::Validation(format!(
                "Update of '{}' has no columns besides the primary key '{}'",
                table, pk.column
            )));
        }

        let key = require_key_value(&pk.column, metadata.primary_key_value(entity))?;
        let placeholder = self.dialect.placeholder(param_counter);
        sql.push_str(&format!(" WHERE {} = {}", pk.column, placeholder));
        params.push(key);

        Ok(Statement::new(sql, params))
    }

    /// `DELETE` of the rows whose `column` equals `id`
    pub fn delete_by_id(
        &self,
        table: &str,
        column: &str,
        id: DatabaseValue,
    ) -> ModelResult<Statement> {
        validate_table_name(table)?;
        validate_identifier(column)?;
        let id = require_key_value(column, Some(id))?;

        let placeholder = self.dialect.placeholder(1);
        let sql = format!("DELETE FROM {} WHERE {} = {}", table, column, placeholder);
        Ok(Statement::new(sql, vec![id]))
    }

    /// `DELETE` keyed on the primary-key field of `entity`
    pub fn delete_by_pk<T>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        entity: &T,
    ) -> ModelResult<Statement> {
        let pk = metadata.require_primary_key("Delete by primary key")?;
        let id = require_key_value(&pk.column, metadata.primary_key_value(entity))?;

        self.delete_by_id(table, &pk.column, id)
    }

    /// `SELECT` of every mapped column, ordered by the first declared column
    pub fn list<T>(&self, table: &str, metadata: &EntityMetadata<T>) -> ModelResult<Statement> {
        validate_table_name(table)?;

        let columns = metadata.column_names();
        let order_by = match columns.first() {
            Some(column) => *column,
            None => {
                return Err(ModelError::Validation(format!(
                    "Select from '{}' has no mapped columns",
                    table
                )))
            }
        };

        let sql = format!("SELECT {} FROM {} ORDER BY {}", columns.join(", "), table, order_by);
        Ok(Statement::new(sql, Vec::new()))
    }

    /// `SELECT` of every mapped column for the row whose primary key equals `id`
    pub fn find_by_id<T>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        id: DatabaseValue,
    ) -> ModelResult<Statement> {
        let pk = metadata.require_primary_key("Find by id")?;
        validate_table_name(table)?;
        let id = require_key_value(&pk.column, Some(id))?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            metadata.column_names().join(", "),
            table,
            pk.column,
            self.dialect.placeholder(1)
        );
        Ok(Statement::new(sql, vec![id]))
    }

    /// Returns the statement text, its parameters and the next free position
    fn build_insert_sql<T>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        entity: &T,
    ) -> ModelResult<(String, Vec<DatabaseValue>, usize)> {
        validate_table_name(table)?;

        let mut sql = format!("INSERT INTO {} (", table);
        sql.push_str(&metadata.column_names().join(", "));
        sql.push_str(") VALUES (");

        let mut params = Vec::new();
        let mut param_counter = 1;

        for (index, column) in metadata.columns().iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }

            if let Some(sequence) = &column.sequence {
                let sequence = qualify(self.schema.as_deref(), sequence);
                validate_table_name(&sequence)?;
                sql.push_str(&self.dialect.sequence_next_value(&sequence));
                continue;
            }

            let value = metadata.value_of(entity, index);
            if column.is_primary_key && value.is_null() {
                return Err(ModelError::Validation(format!(
                    "Primary key '{}' has no sequence and no value to insert",
                    column.column
                )));
            }

            sql.push_str(&self.dialect.placeholder(param_counter));
            params.push(value);
            param_counter += 1;
        }
        sql.push(')');

        Ok((sql, params, param_counter))
    }
}

/// `SCHEMA.NAME` for a bare `name`; names that already carry a schema are kept
pub(crate) fn qualify(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) if !name.contains('.') => format!("{}.{}", schema, name),
        _ => name.to_string(),
    }
}

fn require_key_value(column: &str, value: Option<DatabaseValue>) -> ModelResult<DatabaseValue> {
    match value {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(ModelError::Validation(format!("No value supplied for key column '{}'", column))),
    }
}
