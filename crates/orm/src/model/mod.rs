//! Entity System - field-binding tables for mapped types
//!
//! A mapped type exposes its fields as an ordered table of [`FieldBinding`]s.
//! Each binding carries the field's annotation string together with a getter
//! and a setter, which is all the mapper needs to build statements from an
//! instance and to fill fresh instances from result rows.
//!
//! The table is normally generated by `#[derive(Entity)]`, but it can be
//! written by hand:
//!
//! ```
//! use crudmap::{Entity, FieldBinding};
//!
//! #[derive(Debug, Default)]
//! struct Product {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Product {
//!     fn table_name() -> &'static str {
//!         "PRODUCTS"
//!     }
//!
//!     fn fields() -> Vec<FieldBinding<Self>> {
//!         vec![
//!             FieldBinding::new(
//!                 "id",
//!                 "ID,pk,seq=PRODUCTS_SEQ",
//!                 |p| p.id.into(),
//!                 |p, v| {
//!                     p.id = v.into_field()?;
//!                     Ok(())
//!                 },
//!             ),
//!             FieldBinding::new(
//!                 "name",
//!                 "NAME",
//!                 |p| p.name.clone().into(),
//!                 |p, v| {
//!                     p.name = v.into_field()?;
//!                     Ok(())
//!                 },
//!             ),
//!         ]
//!     }
//! }
//! ```

use std::fmt;

use crate::backends::DatabaseValue;
use crate::error::ModelResult;

pub use crate::backends::FromDatabaseValue;

/// Reads a field out of an entity
pub type FieldGetter<T> = fn(&T) -> DatabaseValue;

/// Writes a column value into an entity field
pub type FieldSetter<T> = fn(&mut T, DatabaseValue) -> ModelResult<()>;

/// A type whose instances the mapper can store and load.
///
/// Instances are created with `Default` before row values are assigned, so
/// every mapped type needs a cheap default value.
pub trait Entity: Default + Send + Sync + Sized {
    /// Default table for repository operations
    fn table_name() -> &'static str;

    /// Field bindings in declaration order.
    ///
    /// Declaration order decides column order in every generated statement
    /// and the positional order of bound parameters.
    fn fields() -> Vec<FieldBinding<Self>>;
}

/// One field of an entity type: its annotation plus accessors
pub struct FieldBinding<T> {
    name: &'static str,
    annotation: &'static str,
    get: FieldGetter<T>,
    set: FieldSetter<T>,
}

impl<T> FieldBinding<T> {
    /// Binding for field `name` carrying `annotation`
    /// (`COLUMN[,pk][,seq=SEQUENCE]`, or empty for an unmapped field)
    pub fn new(
        name: &'static str,
        annotation: &'static str,
        get: FieldGetter<T>,
        set: FieldSetter<T>,
    ) -> Self {
        Self {
            name,
            annotation,
            get,
            set,
        }
    }

    /// Binding for a field the mapper must ignore
    pub fn unmapped(name: &'static str) -> Self {
        Self {
            name,
            annotation: "",
            get: |_| DatabaseValue::Null,
            set: |_, _| Ok(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn annotation(&self) -> &'static str {
        self.annotation
    }

    pub fn is_mapped(&self) -> bool {
        !self.annotation.trim().is_empty()
    }

    /// Current value of the field on `entity`
    pub fn value(&self, entity: &T) -> DatabaseValue {
        (self.get)(entity)
    }

    /// Store `value` into the field on `entity`
    pub fn assign(&self, entity: &mut T, value: DatabaseValue) -> ModelResult<()> {
        (self.set)(entity, value)
    }
}

impl<T> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            annotation: self.annotation,
            get: self.get,
            set: self.set,
        }
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("annotation", &self.annotation)
            .finish()
    }
}
