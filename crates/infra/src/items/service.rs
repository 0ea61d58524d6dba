//! Item write path.
//!
//! Every committed create or update is broadcast in full on the items
//! channel (`inventory` unless configured otherwise). The broadcast is
//! best-effort: the write has already happened, so a transport failure is
//! logged and swallowed.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use stockwatch_core::{DomainError, ItemId};
use stockwatch_events::{BroadcastMessage, BroadcastTransport, ITEMS_CHANNEL};
use stockwatch_inventory::{Item, ItemPatch, NewItem};

use super::{ItemRepository, RepositoryError};

/// Event name used on the items channel for creates and updates. Existing
/// Echo clients listen for the fully qualified name.
pub const ITEM_UPDATED_EVENT: &str = "App\\Events\\ItemUpdated";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ItemServiceError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => ItemServiceError::NotFound(id),
            other => ItemServiceError::Repository(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemService<R, T> {
    repository: R,
    transport: T,
    channel: String,
}

impl<R, T> ItemService<R, T>
where
    R: ItemRepository,
    T: BroadcastTransport,
{
    pub fn new(repository: R, transport: T) -> Self {
        Self {
            repository,
            transport,
            channel: ITEMS_CHANNEL.to_string(),
        }
    }

    /// Broadcast item changes on `channel` instead of `inventory`.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub async fn create(&self, input: NewItem) -> Result<Item, ItemServiceError> {
        let item = Item::create(ItemId::new(), input, Utc::now())?;
        self.repository.insert(&item).await?;
        self.broadcast(&item).await;
        Ok(item)
    }

    pub async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, ItemServiceError> {
        let mut item = self
            .repository
            .get(id)
            .await?
            .ok_or(ItemServiceError::NotFound(id))?;

        item.apply(patch, Utc::now())?;
        self.repository.update(&item).await?;
        self.broadcast(&item).await;
        Ok(item)
    }

    /// Deletes are not broadcast.
    pub async fn delete(&self, id: ItemId) -> Result<(), ItemServiceError> {
        self.repository.delete(id).await?;
        Ok(())
    }

    pub async fn get(&self, id: ItemId) -> Result<Item, ItemServiceError> {
        self.repository
            .get(id)
            .await?
            .ok_or(ItemServiceError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Item>, ItemServiceError> {
        Ok(self.repository.list().await?)
    }

    async fn broadcast(&self, item: &Item) {
        let payload = match serde_json::to_value(item) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "failed to encode item for broadcast");
                return;
            }
        };

        let message = BroadcastMessage::new(&self.channel, ITEM_UPDATED_EVENT, payload);
        match self.transport.publish(message).await {
            Ok(()) => debug!(item_id = %item.id, "item update broadcast"),
            Err(e) => warn!(item_id = %item.id, error = %e, "failed to broadcast item update"),
        }
    }
}
