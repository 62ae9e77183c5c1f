//! Typed repository over [`EntityMapper`]
//!
//! Binds the mapper to one entity type and its default table, which is the
//! shape the service layers above the mapper work with.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::backends::{DatabasePool, DatabaseValue};
use crate::error::ModelResult;
use crate::mapper::EntityMapper;
use crate::metadata::EntityMetadata;
use crate::model::Entity;

/// CRUD for one entity type on `T::table_name()`
pub struct Repository<T: Entity> {
    mapper: Arc<EntityMapper>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(mapper: Arc<EntityMapper>) -> Self {
        Self {
            mapper,
            _entity: PhantomData,
        }
    }

    /// Repository on a mapper of its own
    pub fn from_pool(pool: Arc<dyn DatabasePool>) -> Self {
        Self::new(Arc::new(EntityMapper::new(pool)))
    }

    pub fn mapper(&self) -> &EntityMapper {
        &self.mapper
    }

    pub fn table(&self) -> &'static str {
        T::table_name()
    }

    /// Insert `entity` and return it with its generated primary key set
    pub async fn create(&self, mut entity: T) -> ModelResult<T> {
        let id = self.mapper.insert_returning_id(T::table_name(), &entity).await?;

        EntityMetadata::<T>::extract()?.assign_primary_key(&mut entity, DatabaseValue::Int64(id))?;
        Ok(entity)
    }

    pub async fn list(&self) -> ModelResult<Vec<T>> {
        self.mapper.list(T::table_name()).await
    }

    /// Update `entity`; returns the affected row count, zero when its key matches no row
    pub async fn update(&self, entity: &T) -> ModelResult<u64> {
        self.mapper.update(T::table_name(), entity).await
    }

    /// Delete the entity whose primary key equals `id`
    pub async fn delete(&self, id: impl Into<DatabaseValue>) -> ModelResult<u64> {
        let metadata = EntityMetadata::<T>::extract()?;
        let mut keyed = T::default();
        metadata.assign_primary_key(&mut keyed, id.into())?;

        self.mapper.delete_by_pk(T::table_name(), &keyed).await
    }

    pub async fn find(&self, id: impl Into<DatabaseValue>) -> ModelResult<T> {
        self.mapper.find(T::table_name(), id).await
    }
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.mapper))
    }
}

impl<T: Entity> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &T::table_name())
            .field("mapper", &self.mapper)
            .finish()
    }
}
