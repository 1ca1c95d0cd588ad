use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{Credentials, Identity, IdentityClient, IdentityError, Session, UserInput};

#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: Identity,
    fetched_at: Instant,
}

/// Bounded, short-lived identity cache in front of another client.
///
/// Entries expire after `ttl` so role changes (in particular admin
/// revocation) become visible within that window. Misses and `NotFound`
/// results are never cached. Update and delete pass-throughs evict the
/// affected entry immediately.
pub struct CachedIdentityClient<C> {
    inner: C,
    ttl: Duration,
    capacity: usize,
    entries: Arc<RwLock<HashMap<String, CachedIdentity>>>,
}

impl<C: IdentityClient> CachedIdentityClient<C> {
    pub fn new(inner: C, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity: capacity.max(1),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn invalidate(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    async fn lookup(&self, id: &str) -> Option<Identity> {
        let entries = self.entries.read().await;
        entries
            .get(id)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.identity.clone())
    }

    async fn store(&self, identity: &Identity) {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.capacity && !entries.contains_key(&identity.id) {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
        }
        if entries.len() >= self.capacity && !entries.contains_key(&identity.id) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.fetched_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            identity.id.clone(),
            CachedIdentity {
                identity: identity.clone(),
                fetched_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl<C: IdentityClient> IdentityClient for CachedIdentityClient<C> {
    async fn fetch_by_id(&self, id: &str) -> Result<Identity, IdentityError> {
        if let Some(identity) = self.lookup(id).await {
            debug!("Identity cache hit: {}", id);
            return Ok(identity);
        }

        match self.inner.fetch_by_id(id).await {
            Ok(identity) => {
                self.store(&identity).await;
                Ok(identity)
            }
            Err(IdentityError::NotFound(missing)) => {
                self.invalidate(id).await;
                Err(IdentityError::NotFound(missing))
            }
            Err(other) => Err(other),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<Identity>, IdentityError> {
        self.inner.fetch_all().await
    }

    async fn create(&self, input: &UserInput) -> Result<Identity, IdentityError> {
        self.inner.create(input).await
    }

    async fn update(&self, token: &str, input: &UserInput) -> Result<Identity, IdentityError> {
        let identity = self.inner.update(token, input).await?;
        self.invalidate(&identity.id).await;
        Ok(identity)
    }

    async fn delete(&self, token: &str, id: &str) -> Result<Identity, IdentityError> {
        let result = self.inner.delete(token, id).await;
        if result.is_ok() {
            self.invalidate(id).await;
        }
        result
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, IdentityError> {
        let session = self.inner.authenticate(credentials).await?;
        self.store(&session.user).await;
        Ok(session)
    }
}
