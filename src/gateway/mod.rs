//! Aggregation layer joining locally stored items with remote identities.
//!
//! Every mutation runs authenticate, fetch, authorize, conditional write,
//! hydrate, in that order. Hydration never sees an uncommitted item and
//! never undoes a committed one.

pub mod error;
mod hydration;
mod users;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{authorize, write_guard, CallerContext, Decision, DenyReason};
use crate::database::{Item, ItemInput, ItemPatch, ItemStore, WriteCondition};
use crate::geo::{self, BoundingRegion, Point};
use crate::identity::{Identity, IdentityClient};
use crate::types::Operation;

pub use error::GatewayError;

pub const DEFAULT_HYDRATION_CONCURRENCY: usize = 8;

/// Item as returned to consumers, with the owner reference resolved.
/// `owner` is `None` when the reference no longer resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: Uuid,
    pub item_name: String,
    pub weight: f64,
    pub filename: String,
    pub birthdate: NaiveDate,
    pub location: Point,
    pub owner: Option<Identity>,
}

impl ItemView {
    pub fn new(item: Item, owner: Option<Identity>) -> Self {
        Self {
            id: item.id,
            item_name: item.item_name,
            weight: item.weight,
            filename: item.filename,
            birthdate: item.birthdate,
            location: item.location,
            owner,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Clone)]
pub struct AggregationGateway {
    store: Arc<dyn ItemStore>,
    identity: Arc<dyn IdentityClient>,
    hydration_concurrency: usize,
}

impl AggregationGateway {
    pub fn new(store: Arc<dyn ItemStore>, identity: Arc<dyn IdentityClient>) -> Self {
        Self {
            store,
            identity,
            hydration_concurrency: DEFAULT_HYDRATION_CONCURRENCY,
        }
    }

    pub fn with_hydration_concurrency(mut self, concurrency: usize) -> Self {
        self.hydration_concurrency = concurrency.max(1);
        self
    }

    pub async fn list_items(&self) -> GatewayResult<Vec<ItemView>> {
        let items = self.store.list().await?;
        debug!("Listing {} items", items.len());
        self.hydrate_all(items).await
    }

    pub async fn get_item(&self, id: Uuid) -> GatewayResult<ItemView> {
        let item = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::item_not_found(id))?;
        let owner = hydration::resolve_owner(self.identity.as_ref(), &item.owner).await?;
        Ok(ItemView::new(item, owner))
    }

    /// Items referencing `owner_id`. The id is not checked against the
    /// identity service; an unknown owner simply has no items.
    pub async fn list_items_by_owner(&self, owner_id: &str) -> GatewayResult<Vec<ItemView>> {
        let items = self.store.list_by_owner(owner_id).await?;
        self.hydrate_all(items).await
    }

    /// Items of the authenticated caller
    pub async fn list_my_items(
        &self,
        caller: Option<&CallerContext>,
    ) -> GatewayResult<Vec<ItemView>> {
        let caller = caller.ok_or(GatewayError::Unauthenticated)?;
        self.list_items_by_owner(&caller.id).await
    }

    pub async fn list_items_by_region(
        &self,
        region: &BoundingRegion,
    ) -> GatewayResult<Vec<ItemView>> {
        region.validate()?;
        let candidates = self.store.list_within(&region.bounds()).await?;
        let items = geo::filter_validated(candidates, region);
        debug!("Region query matched {} items", items.len());
        self.hydrate_all(items).await
    }

    pub async fn create_item(
        &self,
        caller: Option<&CallerContext>,
        input: ItemInput,
    ) -> GatewayResult<ItemView> {
        let caller = caller.ok_or(GatewayError::Unauthenticated)?;
        let item = self.store.insert(&caller.id, &input).await?;
        info!("Item {} created by {}", item.id, caller.id);
        Ok(hydration::hydrate_committed(self.identity.as_ref(), item).await)
    }

    pub async fn update_item(
        &self,
        caller: Option<&CallerContext>,
        id: Uuid,
        patch: ItemPatch,
    ) -> GatewayResult<ItemView> {
        let condition = self.authorize_write(caller, Operation::Update, id).await?;
        let item = match self.store.update(&condition, &patch).await? {
            Some(item) => item,
            None => return Err(self.lost_write(id).await?),
        };
        info!("Item {} updated", item.id);
        Ok(hydration::hydrate_committed(self.identity.as_ref(), item).await)
    }

    pub async fn delete_item(
        &self,
        caller: Option<&CallerContext>,
        id: Uuid,
    ) -> GatewayResult<ItemView> {
        let condition = self.authorize_write(caller, Operation::Delete, id).await?;
        let item = match self.store.delete(&condition).await? {
            Some(item) => item,
            None => return Err(self.lost_write(id).await?),
        };
        info!("Item {} deleted", item.id);
        Ok(hydration::hydrate_committed(self.identity.as_ref(), item).await)
    }

    /// Run the gate for a mutation of item `id` and, on allow, return the
    /// storage condition that re-checks the same rule at write time.
    async fn authorize_write(
        &self,
        caller: Option<&CallerContext>,
        operation: Operation,
        id: Uuid,
    ) -> GatewayResult<WriteCondition> {
        let Some(caller) = caller else {
            warn!("Rejected {:?} of item {}: no caller", operation, id);
            return Err(GatewayError::denied(DenyReason::Unauthenticated));
        };

        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::item_not_found(id))?;

        match authorize(Some(caller), operation, &existing.owner) {
            Decision::Allow => Ok(WriteCondition::new(id, write_guard(caller))),
            Decision::Deny(reason) => {
                warn!(
                    "Rejected {:?} of item {} by {} ({:?})",
                    operation, id, caller.id, reason
                );
                Err(GatewayError::denied(reason))
            }
        }
    }

    /// A conditional write matched nothing: either the item vanished or its
    /// owner changed after the gate ran.
    async fn lost_write(&self, id: Uuid) -> GatewayResult<GatewayError> {
        match self.store.get(id).await? {
            Some(_) => {
                warn!("Ownership of item {} changed before write", id);
                Ok(GatewayError::denied(DenyReason::NotAuthorized))
            }
            None => Ok(GatewayError::item_not_found(id)),
        }
    }

    pub async fn health_check(&self) -> GatewayResult<()> {
        self.store.health_check().await?;
        Ok(())
    }

    async fn hydrate_all(&self, items: Vec<Item>) -> GatewayResult<Vec<ItemView>> {
        hydration::hydrate_all(self.identity.as_ref(), items, self.hydration_concurrency).await
    }
}
