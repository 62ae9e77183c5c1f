//! Entity Mapper
//!
//! Generic CRUD over any [`Entity`]: derives metadata, builds one statement
//! and runs it as a single round trip on the shared pool.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backends::{DatabasePool, DatabaseValue, SqlDialect};
use crate::error::{ModelError, ModelResult};
use crate::hydration::{materialize_all, materialize_one};
use crate::metadata::EntityMetadata;
use crate::model::Entity;
use crate::sql::builder::qualify;
use crate::sql::{Statement, StatementBuilder};

/// Maps entities onto tables of one database
#[derive(Clone)]
pub struct EntityMapper {
    pool: Arc<dyn DatabasePool>,
    schema: Option<String>,
}

impl EntityMapper {
    pub fn new(pool: Arc<dyn DatabasePool>) -> Self {
        Self { pool, schema: None }
    }

    /// Qualify table and sequence names that carry no schema of their own with `schema`
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    pub fn dialect(&self) -> SqlDialect {
        self.pool.dialect()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Insert `entity` and return the affected row count
    pub async fn insert<T: Entity>(&self, table: &str, entity: &T) -> ModelResult<u64> {
        let metadata = EntityMetadata::<T>::extract()?;
        let statement = self.builder().insert(&self.qualify(table), &metadata, entity)?;

        self.execute(&statement).await
    }

    /// Insert `entity` and return the primary key generated for it
    pub async fn insert_returning_id<T: Entity>(
        &self,
        table: &str,
        entity: &T,
    ) -> ModelResult<i64> {
        let metadata = EntityMetadata::<T>::extract()?;
        let statement = self
            .builder()
            .insert_returning_id(&self.qualify(table), &metadata, entity)?;
        let returning = statement.returning.as_ref().ok_or_else(|| {
            ModelError::Query(format!("Insert into {} has no returning clause", table))
        })?;

        debug!("Executing: {} ({} params)", statement.sql, statement.params.len());
        let value = self
            .pool
            .execute_returning(&statement.sql, &statement.params, returning)
            .await?;

        let id = value
            .into_field::<i64>()
            .map_err(|e| e.for_column(&returning.column))?;
        debug!("Generated {} = {}", returning.column, id);

        Ok(id)
    }

    /// Update every non-key column of the row keyed by `entity`'s primary key.
    ///
    /// A key that matches no row is not an error; the call reports zero
    /// affected rows.
    pub async fn update<T: Entity>(&self, table: &str, entity: &T) -> ModelResult<u64> {
        let metadata = EntityMetadata::<T>::extract()?;
        let statement = self.builder().update(&self.qualify(table), &metadata, entity)?;

        let affected = self.execute(&statement).await?;
        if affected == 0 {
            warn!("Update of {} matched no row", table);
        }
        Ok(affected)
    }

    /// Delete the rows whose `column` equals `id`
    pub async fn delete_by_id(
        &self,
        table: &str,
        column: &str,
        id: impl Into<DatabaseValue>,
    ) -> ModelResult<u64> {
        let statement = self
            .builder()
            .delete_by_id(&self.qualify(table), column, id.into())?;

        self.execute_delete(table, &statement).await
    }

    /// Delete the row keyed by `entity`'s primary key
    pub async fn delete_by_pk<T: Entity>(&self, table: &str, entity: &T) -> ModelResult<u64> {
        let metadata = EntityMetadata::<T>::extract()?;
        let statement = self
            .builder()
            .delete_by_pk(&self.qualify(table), &metadata, entity)?;

        self.execute_delete(table, &statement).await
    }

    /// Every row of `table`, ordered by the first mapped column
    pub async fn list<T: Entity>(&self, table: &str) -> ModelResult<Vec<T>> {
        let metadata = EntityMetadata::<T>::extract()?;
        let statement = self.builder().list(&self.qualify(table), &metadata)?;

        debug!("Executing: {}", statement.sql);
        let rows = self.pool.fetch_all(&statement.sql, &statement.params).await?;
        debug!("Fetched {} rows from {}", rows.len(), table);

        materialize_all(&metadata, rows)
    }

    /// The row whose primary key equals the primary key of `keyed`
    pub async fn find_by_id<T: Entity>(&self, table: &str, keyed: &T) -> ModelResult<T> {
        let metadata = EntityMetadata::<T>::extract()?;
        let id = metadata.primary_key_value(keyed).unwrap_or(DatabaseValue::Null);

        self.fetch_one(table, &metadata, id).await
    }

    /// The row whose primary key equals `id`
    pub async fn find<T: Entity>(
        &self,
        table: &str,
        id: impl Into<DatabaseValue>,
    ) -> ModelResult<T> {
        let metadata = EntityMetadata::<T>::extract()?;

        self.fetch_one(table, &metadata, id.into()).await
    }

    async fn fetch_one<T: Entity>(
        &self,
        table: &str,
        metadata: &EntityMetadata<T>,
        id: DatabaseValue,
    ) -> ModelResult<T> {
        let statement = self.builder().find_by_id(&self.qualify(table), metadata, id)?;

        debug!("Executing: {} ({} params)", statement.sql, statement.params.len());
        let row = self.pool.fetch_optional(&statement.sql, &statement.params).await?;

        materialize_one(metadata, table, row)
    }

    async fn execute(&self, statement: &Statement) -> ModelResult<u64> {
        debug!("Executing: {} ({} params)", statement.sql, statement.params.len());
        let affected = self.pool.execute(&statement.sql, &statement.params).await?;
        debug!("{} rows affected", affected);

        Ok(affected)
    }

    async fn execute_delete(&self, table: &str, statement: &Statement) -> ModelResult<u64> {
        let affected = self.execute(statement).await?;
        if affected == 0 {
            warn!("Delete from {} matched no row", table);
        }
        Ok(affected)
    }

    fn builder(&self) -> StatementBuilder {
        let builder = StatementBuilder::new(self.pool.dialect());
        match &self.schema {
            Some(schema) => builder.with_schema(schema.clone()),
            None => builder,
        }
    }

    fn qualify(&self, table: &str) -> String {
        qualify(self.schema.as_deref(), table)
    }
}

impl std::fmt::Debug for EntityMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityMapper")
            .field("dialect", &self.pool.dialect())
            .field("schema", &self.schema)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::backends::{DatabasePoolStats, DatabaseRow};
    use crate::error::{ErrorKind, OrmResult};
    use crate::model::FieldBinding;
    use crate::sql::Returning;

    /// Pool that records statements and answers from canned values
    struct RecordingPool {
        dialect: SqlDialect,
        affected: u64,
        returned: DatabaseValue,
        statements: Mutex<Vec<(String, Vec<DatabaseValue>)>>,
    }

    impl RecordingPool {
        fn new(dialect: SqlDialect) -> Arc<Self> {
            Arc::new(Self {
                dialect,
                affected: 1,
                returned: DatabaseValue::Int64(41),
                statements: Mutex::new(Vec::new()),
            })
        }

        fn with_affected(dialect: SqlDialect, affected: u64) -> Arc<Self> {
            Arc::new(Self {
                dialect,
                affected,
                returned: DatabaseValue::Int64(41),
                statements: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, sql: &str, params: &[DatabaseValue]) {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
        }

        fn statements(&self) -> Vec<(String, Vec<DatabaseValue>)> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabasePool for RecordingPool {
        fn dialect(&self) -> SqlDialect {
            self.dialect
        }

        async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
            self.record(sql, params);
            Ok(self.affected)
        }

        async fn fetch_all(
            &self,
            sql: &str,
            params: &[DatabaseValue],
        ) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
            self.record(sql, params);
            Ok(Vec::new())
        }

        async fn fetch_optional(
            &self,
            sql: &str,
            params: &[DatabaseValue],
        ) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
            self.record(sql, params);
            Ok(None)
        }

        async fn execute_returning(
            &self,
            sql: &str,
            params: &[DatabaseValue],
            returning: &Returning,
        ) -> OrmResult<DatabaseValue> {
            self.record(sql, params);
            assert_eq!(returning.out_position, params.len() + 1);
            Ok(self.returned.clone())
        }

        async fn health_check(&self) -> OrmResult<Duration> {
            Ok(Duration::ZERO)
        }

        fn stats(&self) -> DatabasePoolStats {
            DatabasePoolStats {
                total_connections: 1,
                idle_connections: 1,
                active_connections: 0,
            }
        }

        async fn close(&self) -> OrmResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Product {
        id: i64,
        name: String,
        price: f64,
    }

    impl Entity for Product {
        fn table_name() -> &'static str {
            "PRODUCTS"
        }

        fn fields() -> Vec<FieldBinding<Self>> {
            vec![
                FieldBinding::new("id", "ID,pk,seq=PRODUCTS_SEQ", |p| p.id.into(), |p, v| {
                    p.id = v.into_field()?;
                    Ok(())
                }),
                FieldBinding::new("name", "NAME", |p| p.name.clone().into(), |p, v| {
                    p.name = v.into_field()?;
                    Ok(())
                }),
                FieldBinding::new("price", "PRICE", |p| p.price.into(), |p, v| {
                    p.price = v.into_field()?;
                    Ok(())
                }),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct AuditEntry {
        message: String,
    }

    impl Entity for AuditEntry {
        fn table_name() -> &'static str {
            "AUDIT_LOG"
        }

        fn fields() -> Vec<FieldBinding<Self>> {
            vec![FieldBinding::new("message", "MESSAGE", |a| a.message.clone().into(), |a, v| {
                a.message = v.into_field()?;
                Ok(())
            })]
        }
    }

    fn lamp() -> Product {
        Product {
            id: 0,
            name: "Lamp".into(),
            price: 20.0,
        }
    }

    #[tokio::test]
    async fn test_insert_returning_id_on_oracle() {
        let pool = RecordingPool::new(SqlDialect::Oracle);
        let mapper = EntityMapper::new(pool.clone());

        let id = mapper.insert_returning_id("PRODUCTS", &lamp()).await.unwrap();

        assert_eq!(id, 41);
        let statements = pool.statements();
        assert_eq!(
            statements[0].0,
            "INSERT INTO PRODUCTS (ID, NAME, PRICE) \
             VALUES (PRODUCTS_SEQ.NEXTVAL, :1, :2) RETURNING ID INTO :3"
        );
        assert_eq!(statements[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_schema_qualifies_tables() {
        let pool = RecordingPool::new(SqlDialect::PostgreSQL);
        let mapper = EntityMapper::new(pool.clone()).with_schema("SHOP");

        mapper.insert("PRODUCTS", &lamp()).await.unwrap();
        let _ = mapper.find::<Product>("PRODUCTS", 3i64).await;

        let statements = pool.statements();
        assert!(statements[0].0.starts_with("INSERT INTO SHOP.PRODUCTS "));
        assert_eq!(statements[1].0, "SELECT ID, NAME, PRICE FROM SHOP.PRODUCTS WHERE ID = $1");
    }

    #[tokio::test]
    async fn test_schema_qualifies_sequences() {
        let pool = RecordingPool::new(SqlDialect::Oracle);
        let mapper = EntityMapper::new(pool.clone()).with_schema("SHOP");

        mapper.insert_returning_id("PRODUCTS", &lamp()).await.unwrap();
        mapper.delete_by_id("ARCHIVE.PRODUCTS", "ID", 1i64).await.unwrap();

        let statements = pool.statements();
        assert_eq!(
            statements[0].0,
            "INSERT INTO SHOP.PRODUCTS (ID, NAME, PRICE) \
             VALUES (SHOP.PRODUCTS_SEQ.NEXTVAL, :1, :2) RETURNING ID INTO :3"
        );
        assert_eq!(statements[1].0, "DELETE FROM ARCHIVE.PRODUCTS WHERE ID = :1");
    }

    #[tokio::test]
    async fn test_update_of_missing_row_reports_zero() {
        let pool = RecordingPool::with_affected(SqlDialect::PostgreSQL, 0);
        let mapper = EntityMapper::new(pool.clone());

        let affected = mapper.update("PRODUCTS", &Product { id: 999, ..lamp() }).await.unwrap();

        assert_eq!(affected, 0);
        assert_eq!(
            pool.statements()[0].0,
            "UPDATE PRODUCTS SET NAME = $1, PRICE = $2 WHERE ID = $3"
        );
    }

    #[tokio::test]
    async fn test_mapping_errors_execute_nothing() {
        let pool = RecordingPool::new(SqlDialect::SQLite);
        let mapper = EntityMapper::new(pool.clone());
        let entry = AuditEntry {
            message: "started".into(),
        };

        let errors: Vec<ModelError> = vec![
            mapper.delete_by_pk("AUDIT_LOG", &entry).await.unwrap_err(),
            mapper.update("AUDIT_LOG", &entry).await.unwrap_err(),
            mapper.insert_returning_id("AUDIT_LOG", &entry).await.unwrap_err(),
            mapper.find_by_id("AUDIT_LOG", &entry).await.unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Mapping);
        }
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn test_point_query_not_found_and_empty_list() {
        let pool = RecordingPool::new(SqlDialect::SQLite);
        let mapper = EntityMapper::new(pool.clone());

        let err = mapper.find_by_id("PRODUCTS", &Product { id: 5, ..lamp() }).await.unwrap_err();
        assert!(err.is_not_found());

        let all: Vec<Product> = mapper.list("PRODUCTS").await.unwrap();
        assert!(all.is_empty());

        let statements = pool.statements();
        assert_eq!(statements[0].1, vec![DatabaseValue::Int64(5)]);
        assert_eq!(statements[1].0, "SELECT ID, NAME, PRICE FROM PRODUCTS ORDER BY ID");
    }

    #[tokio::test]
    async fn test_delete_by_id_and_pk() {
        let pool = RecordingPool::new(SqlDialect::Oracle);
        let mapper = EntityMapper::new(pool.clone());

        assert_eq!(mapper.delete_by_id("PRODUCTS", "ID", 7i64).await.unwrap(), 1);
        assert_eq!(mapper.delete_by_pk("PRODUCTS", &Product { id: 8, ..lamp() }).await.unwrap(), 1);

        let statements = pool.statements();
        assert_eq!(statements[0].0, "DELETE FROM PRODUCTS WHERE ID = :1");
        assert_eq!(statements[1].1, vec![DatabaseValue::Int64(8)]);
    }
}
