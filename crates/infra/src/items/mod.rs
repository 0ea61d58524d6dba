//! Item persistence, the threshold trigger schema and the item write path.

pub mod in_memory;
pub mod postgres;
pub mod schema;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockwatch_core::ItemId;
use stockwatch_inventory::Item;

pub use in_memory::{InMemoryItemRepository, ThresholdHook};
pub use postgres::PostgresItemRepository;
pub use schema::SchemaError;
pub use service::{ITEM_UPDATED_EVENT, ItemService, ItemServiceError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("item already exists: {0}")]
    AlreadyExists(ItemId),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("database error: {0}")]
    Database(String),
}

/// Storage for items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn insert(&self, item: &Item) -> Result<(), RepositoryError>;

    /// Overwrite an existing item. `NotFound` when it does not exist.
    async fn update(&self, item: &Item) -> Result<(), RepositoryError>;

    async fn delete(&self, id: ItemId) -> Result<(), RepositoryError>;

    async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;

    /// All items, oldest first.
    async fn list(&self) -> Result<Vec<Item>, RepositoryError>;

    /// Live row count. No locking, no caching.
    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[async_trait]
impl<R> ItemRepository for Arc<R>
where
    R: ItemRepository + ?Sized,
{
    async fn insert(&self, item: &Item) -> Result<(), RepositoryError> {
        (**self).insert(item).await
    }

    async fn update(&self, item: &Item) -> Result<(), RepositoryError> {
        (**self).update(item).await
    }

    async fn delete(&self, id: ItemId) -> Result<(), RepositoryError> {
        (**self).delete(id).await
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<Item>, RepositoryError> {
        (**self).list().await
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        (**self).count().await
    }
}
