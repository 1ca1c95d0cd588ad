use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::warn;

use crate::database::Item;
use crate::identity::{Identity, IdentityClient, IdentityError};

use super::error::GatewayError;
use super::ItemView;

/// Resolve one owner reference. A stale reference yields `None`; any other
/// identity failure is returned to the caller.
pub(super) async fn resolve_owner(
    identity: &dyn IdentityClient,
    owner: &str,
) -> Result<Option<Identity>, GatewayError> {
    match identity.fetch_by_id(owner).await {
        Ok(found) => Ok(Some(found)),
        Err(IdentityError::NotFound(_)) => {
            warn!("Owner {} no longer exists, returning item without owner", owner);
            Ok(None)
        }
        Err(other) => Err(other.into()),
    }
}

/// Hydrate a list of items. Each distinct owner is looked up once, at most
/// `concurrency` lookups run at a time, and output order follows input
/// order. The first systemic failure aborts the whole list.
pub(super) async fn hydrate_all(
    identity: &dyn IdentityClient,
    items: Vec<Item>,
    concurrency: usize,
) -> Result<Vec<ItemView>, GatewayError> {
    let owners: Vec<String> = {
        let mut seen = HashSet::new();
        items
            .iter()
            .filter(|item| seen.insert(item.owner.as_str()))
            .map(|item| item.owner.clone())
            .collect()
    };

    let resolved: HashMap<String, Option<Identity>> = stream::iter(owners)
        .map(|owner| async move {
            let found = resolve_owner(identity, &owner).await?;
            Ok::<_, GatewayError>((owner, found))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(items
        .into_iter()
        .map(|item| {
            let owner = resolved.get(&item.owner).cloned().flatten();
            ItemView::new(item, owner)
        })
        .collect())
}

/// Hydrate an item whose mutation is already committed. Lookup failures are
/// logged and the owner left empty rather than failing the operation.
pub(super) async fn hydrate_committed(identity: &dyn IdentityClient, item: Item) -> ItemView {
    let owner = match resolve_owner(identity, &item.owner).await {
        Ok(owner) => owner,
        Err(e) => {
            warn!(
                "Owner lookup for committed item {} failed ({}), returning without owner",
                item.id, e
            );
            None
        }
    };
    ItemView::new(item, owner)
}
