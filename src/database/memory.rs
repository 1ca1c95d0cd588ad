use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::item::{Item, ItemInput, ItemPatch};
use crate::database::store::{ItemStore, WriteCondition};
use crate::geo::Bounds;

/// Process-local item store for development runs and tests. Keeps insertion
/// order, which is also the listing order.
#[derive(Clone, Default)]
pub struct MemoryItemStore {
    items: Arc<RwLock<Vec<Item>>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Replace the owner of a stored item. Only used to simulate ownership
    /// transfers happening behind the gateway's back.
    pub async fn set_owner(&self, id: Uuid, owner: &str) -> bool {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.owner = owner.to_string();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn list(&self) -> Result<Vec<Item>, DatabaseError> {
        Ok(self.items.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, DatabaseError> {
        Ok(self.items.read().await.iter().find(|item| item.id == id).cloned())
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Item>, DatabaseError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|item| item.owner == owner)
            .cloned()
            .collect())
    }

    async fn list_within(&self, bounds: &Bounds) -> Result<Vec<Item>, DatabaseError> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|item| bounds.contains(&item.location))
            .cloned()
            .collect())
    }

    async fn insert(&self, owner: &str, input: &ItemInput) -> Result<Item, DatabaseError> {
        let item = Item {
            id: Uuid::new_v4(),
            item_name: input.item_name.clone(),
            weight: input.weight,
            filename: input.filename.clone(),
            birthdate: input.birthdate,
            location: input.location,
            owner: owner.to_string(),
        };
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn update(
        &self,
        condition: &WriteCondition,
        patch: &ItemPatch,
    ) -> Result<Option<Item>, DatabaseError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter_mut()
            .find(|item| condition.matches(item))
            .map(|item| {
                patch.apply(item);
                item.clone()
            }))
    }

    async fn delete(&self, condition: &WriteCondition) -> Result<Option<Item>, DatabaseError> {
        let mut items = self.items.write().await;
        Ok(items
            .iter()
            .position(|item| condition.matches(item))
            .map(|index| items.remove(index)))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
