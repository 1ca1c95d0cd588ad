use async_trait::async_trait;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::item::{Item, ItemInput, ItemPatch};
use crate::geo::Bounds;

/// Storage-level condition for a single-row write.
///
/// `owner: None` matches on id alone; `Some(owner)` additionally requires the
/// stored owner to match, so an ownership change between the authorization
/// check and the write cannot slip through.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCondition {
    pub id: Uuid,
    pub owner: Option<String>,
}

impl WriteCondition {
    pub fn new(id: Uuid, owner: Option<&str>) -> Self {
        Self {
            id,
            owner: owner.map(str::to_string),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        item.id == self.id && self.owner.as_deref().map_or(true, |o| o == item.owner)
    }
}

/// Persistence for items. No authorization logic lives here.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Item>, DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<Item>, DatabaseError>;

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Item>, DatabaseError>;

    /// Candidates whose location falls in the envelope. Callers still apply
    /// the exact region predicate.
    async fn list_within(&self, bounds: &Bounds) -> Result<Vec<Item>, DatabaseError>;

    async fn insert(&self, owner: &str, input: &ItemInput) -> Result<Item, DatabaseError>;

    /// Apply `patch` to the row matching `condition`. `None` when no row matched.
    async fn update(
        &self,
        condition: &WriteCondition,
        patch: &ItemPatch,
    ) -> Result<Option<Item>, DatabaseError>;

    /// Remove the row matching `condition`, returning it. `None` when no row matched.
    async fn delete(&self, condition: &WriteCondition) -> Result<Option<Item>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
