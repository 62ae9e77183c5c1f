//! # crudmap: annotation-driven entity mapping
//!
//! Generic CRUD for plain structs. Each entity describes its fields with
//! annotations of the form `COLUMN[,pk][,seq=SEQUENCE]`; the mapper derives
//! column metadata from them, builds parameterized statements for the
//! database's dialect and fills fresh instances from result rows.
//!
//! ```no_run
//! use std::sync::Arc;
//! use crudmap::{connect, DatabaseConfig, Entity, EntityMapper};
//!
//! #[derive(Debug, Default, Entity)]
//! #[db(table = "PRODUCTS")]
//! struct Product {
//!     #[db("ID,pk,seq=PRODUCTS_SEQ")]
//!     id: i64,
//!     #[db("NAME")]
//!     name: String,
//!     #[db("PRICE")]
//!     price: f64,
//! }
//!
//! # async fn run() -> crudmap::ModelResult<()> {
//! let pool = connect(&DatabaseConfig::from_env()?).await?;
//! let mapper = EntityMapper::new(pool);
//!
//! let lamp = Product {
//!     name: "Lamp".into(),
//!     price: 20.0,
//!     ..Default::default()
//! };
//! let id = mapper.insert_returning_id("PRODUCTS", &lamp).await?;
//! let stored: Product = mapper.find("PRODUCTS", id).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod hydration;
pub mod mapper;
pub mod metadata;
pub mod model;
pub mod repository;
pub mod security;
pub mod sql;

pub use backends::{
    DatabaseBackendType, DatabasePool, DatabasePoolStats, DatabaseRow, DatabaseValue,
    FromDatabaseValue, PostgresPool, SqlDialect, SqlitePool,
};
#[cfg(feature = "oracle")]
pub use backends::OraclePool;
pub use config::{connect, ConfigError, DatabaseConfig, PoolConfig};
pub use error::{ErrorKind, ModelError, ModelResult, OrmError, OrmResult};
pub use mapper::EntityMapper;
pub use metadata::{extract_columns, parse_annotation, ColumnDescriptor, EntityMetadata};
pub use model::{Entity, FieldBinding};
pub use repository::Repository;
pub use sql::{Returning, Statement, StatementBuilder};

pub use crudmap_derive::Entity;
