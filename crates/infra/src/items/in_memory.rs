//! In-memory item repository.
//!
//! Has no trigger support of its own; an optional `ThresholdHook` plays the
//! trigger's part by raising a signal after each insert that leaves the count
//! at or above the threshold.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::warn;

use stockwatch_alerts::{AlertError, ItemCounter};
use stockwatch_core::ItemId;
use stockwatch_inventory::Item;

use super::{ItemRepository, RepositoryError};
use crate::listener::SignalSender;

/// Raises threshold signals after inserts.
#[derive(Debug, Clone)]
pub struct ThresholdHook {
    threshold: i64,
    channel: String,
    sender: SignalSender,
}

impl ThresholdHook {
    pub fn new(threshold: i64, channel: impl Into<String>, sender: SignalSender) -> Self {
        Self {
            threshold,
            channel: channel.into(),
            sender,
        }
    }

    fn after_insert(&self, count: i64) {
        if count < self.threshold {
            return;
        }

        let payload = format!("Items count has reached {}", self.threshold);
        if !self.sender.notify(&self.channel, payload) {
            warn!(channel = %self.channel, count, "no listener for threshold signal");
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryItemRepository {
    items: RwLock<HashMap<ItemId, Item>>,
    hook: Option<ThresholdHook>,
}

impl InMemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold_hook(mut self, hook: ThresholdHook) -> Self {
        self.hook = Some(hook);
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ItemId, Item>>, RepositoryError> {
        self.items
            .read()
            .map_err(|_| RepositoryError::Database("item map lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ItemId, Item>>, RepositoryError> {
        self.items
            .write()
            .map_err(|_| RepositoryError::Database("item map lock poisoned".to_string()))
    }
}

#[async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn insert(&self, item: &Item) -> Result<(), RepositoryError> {
        let count = {
            let mut items = self.write()?;
            if items.contains_key(&item.id) {
                return Err(RepositoryError::AlreadyExists(item.id));
            }
            items.insert(item.id, item.clone());
            items.len() as i64
        };

        // Fires after the write is visible, like an AFTER INSERT trigger.
        if let Some(hook) = &self.hook {
            hook.after_insert(count);
        }
        Ok(())
    }

    async fn update(&self, item: &Item) -> Result<(), RepositoryError> {
        let mut items = self.write()?;
        match items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(item.id)),
        }
    }

    async fn delete(&self, id: ItemId) -> Result<(), RepositoryError> {
        self.write()?
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Item>, RepositoryError> {
        let mut items: Vec<Item> = self.read()?.values().cloned().collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.read()?.len() as i64)
    }
}

#[async_trait]
impl ItemCounter for InMemoryItemRepository {
    async fn count_items(&self) -> Result<i64, AlertError> {
        self.count()
            .await
            .map_err(|e| AlertError::orchestration(format!("failed to count items: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{SignalSource, signal_channel};
    use chrono::Utc;
    use std::time::Duration;
    use stockwatch_inventory::NewItem;

    fn item(name: &str) -> Item {
        Item::create(ItemId::new(), NewItem::new(name, 1), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn crud() {
        let repo = InMemoryItemRepository::new();
        let mut widget = item("widget");

        repo.insert(&widget).await.unwrap();
        assert_eq!(
            repo.insert(&widget).await,
            Err(RepositoryError::AlreadyExists(widget.id))
        );

        widget.stock = 9;
        repo.update(&widget).await.unwrap();
        assert_eq!(repo.get(widget.id).await.unwrap().unwrap().stock, 9);
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.delete(widget.id).await.unwrap();
        assert_eq!(repo.get(widget.id).await.unwrap(), None);
        assert_eq!(
            repo.delete(widget.id).await,
            Err(RepositoryError::NotFound(widget.id))
        );
        assert_eq!(
            repo.update(&widget).await,
            Err(RepositoryError::NotFound(widget.id))
        );
    }

    #[tokio::test]
    async fn hook_signals_once_count_reaches_threshold() {
        let (sender, mut source) = signal_channel();
        source.listen("items_count_reached").await.unwrap();

        let repo = InMemoryItemRepository::new()
            .with_threshold_hook(ThresholdHook::new(3, "items_count_reached", sender));

        for name in ["a", "b"] {
            repo.insert(&item(name)).await.unwrap();
        }
        let quiet = source.wait_for_next(Duration::from_millis(10)).await.unwrap();
        assert!(quiet.is_none());

        repo.insert(&item("c")).await.unwrap();
        repo.insert(&item("d")).await.unwrap();

        for _ in 0..2 {
            let signal = source
                .wait_for_next(Duration::from_millis(50))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(signal.payload(), Some("Items count has reached 3"));
        }
    }

    #[tokio::test]
    async fn counter_reports_live_count() {
        let repo = InMemoryItemRepository::new();
        assert_eq!(repo.count_items().await.unwrap(), 0);
        repo.insert(&item("a")).await.unwrap();
        assert_eq!(repo.count_items().await.unwrap(), 1);
    }
}
