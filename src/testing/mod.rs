//! In-crate test doubles for the identity service and the item store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::auth::CallerContext;
use crate::database::{DatabaseError, Item, ItemInput, ItemPatch, ItemStore, WriteCondition};
use crate::geo::{Bounds, Point};
use crate::identity::{Credentials, Identity, IdentityClient, IdentityError, Role, Session, UserInput};

/// Password the stub accepts for every user
pub const STUB_PASSWORD: &str = "password";

/// Identity service stand-in. Tokens are simply the caller's id.
#[derive(Default)]
pub struct StubIdentityClient {
    identities: Mutex<HashMap<String, Identity>>,
    lookups: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, IdentityError>>,
    global_failure: Mutex<Option<IdentityError>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    next_id: AtomicUsize,
}

impl StubIdentityClient {
    pub fn with_identities(identities: Vec<Identity>) -> Self {
        let stub = Self::default();
        for identity in identities {
            stub.put(identity);
        }
        stub
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn put(&self, identity: Identity) {
        self.identities
            .lock()
            .unwrap()
            .insert(identity.id.clone(), identity);
    }

    pub fn remove(&self, id: &str) {
        self.identities.lock().unwrap().remove(id);
    }

    pub fn fail_all_with(&self, error: IdentityError) {
        *self.global_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_id_with(&self, id: &str, error: IdentityError) {
        self.failures.lock().unwrap().insert(id.to_string(), error);
    }

    pub fn lookups(&self, id: &str) -> usize {
        self.lookups.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_lookups(&self) -> usize {
        self.lookups.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check_global(&self) -> Result<(), IdentityError> {
        match self.global_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn find(&self, id: &str) -> Result<Identity, IdentityError> {
        if let Some(error) = self.failures.lock().unwrap().get(id).cloned() {
            return Err(error);
        }
        self.identities
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl IdentityClient for StubIdentityClient {
    async fn fetch_by_id(&self, id: &str) -> Result<Identity, IdentityError> {
        *self.lookups.lock().unwrap().entry(id.to_string()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_global()?;
        self.find(id)
    }

    async fn fetch_all(&self) -> Result<Vec<Identity>, IdentityError> {
        self.check_global()?;
        let mut all: Vec<Identity> = self.identities.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn create(&self, input: &UserInput) -> Result<Identity, IdentityError> {
        self.check_global()?;
        let user_name = input.user_name.clone().ok_or_else(|| IdentityError::Rejected {
            status: 400,
            message: "user_name is required".to_string(),
        })?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let identity = Identity {
            id: format!("new{}", n),
            user_name,
            email: input.email.clone(),
            role: Role::User,
        };
        self.put(identity.clone());
        Ok(identity)
    }

    async fn update(&self, token: &str, input: &UserInput) -> Result<Identity, IdentityError> {
        self.check_global()?;
        let mut identities = self.identities.lock().unwrap();
        let identity = identities
            .get_mut(token)
            .ok_or_else(|| IdentityError::Unauthorized("unknown token".to_string()))?;
        if let Some(name) = &input.user_name {
            identity.user_name = name.clone();
        }
        if let Some(email) = &input.email {
            identity.email = Some(email.clone());
        }
        Ok(identity.clone())
    }

    async fn delete(&self, token: &str, id: &str) -> Result<Identity, IdentityError> {
        self.check_global()?;
        if token.is_empty() {
            return Err(IdentityError::Unauthorized("missing token".to_string()));
        }
        self.identities
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, IdentityError> {
        self.check_global()?;
        let user = self
            .identities
            .lock()
            .unwrap()
            .values()
            .find(|i| i.user_name == credentials.username)
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;
        if credentials.password != STUB_PASSWORD {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(Session {
            token: user.id.clone(),
            user,
        })
    }
}

/// Store whose every call fails, for storage failure propagation
pub struct BrokenItemStore;

impl BrokenItemStore {
    fn failure() -> DatabaseError {
        DatabaseError::Sqlx(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl ItemStore for BrokenItemStore {
    async fn list(&self) -> Result<Vec<Item>, DatabaseError> {
        Err(Self::failure())
    }

    async fn get(&self, _id: Uuid) -> Result<Option<Item>, DatabaseError> {
        Err(Self::failure())
    }

    async fn list_by_owner(&self, _owner: &str) -> Result<Vec<Item>, DatabaseError> {
        Err(Self::failure())
    }

    async fn list_within(&self, _bounds: &Bounds) -> Result<Vec<Item>, DatabaseError> {
        Err(Self::failure())
    }

    async fn insert(&self, _owner: &str, _input: &ItemInput) -> Result<Item, DatabaseError> {
        Err(Self::failure())
    }

    async fn update(
        &self,
        _condition: &WriteCondition,
        _patch: &ItemPatch,
    ) -> Result<Option<Item>, DatabaseError> {
        Err(Self::failure())
    }

    async fn delete(&self, _condition: &WriteCondition) -> Result<Option<Item>, DatabaseError> {
        Err(Self::failure())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Err(Self::failure())
    }
}

pub fn identity(id: &str, role: Role) -> Identity {
    Identity {
        id: id.to_string(),
        user_name: format!("user-{}", id),
        email: Some(format!("{}@example.com", id)),
        role,
    }
}

pub fn caller(id: &str, role: Role) -> CallerContext {
    CallerContext::new(id, role, id)
}

pub fn item_input(name: &str, lat: f64, lng: f64) -> ItemInput {
    ItemInput {
        item_name: name.to_string(),
        weight: 4.5,
        filename: format!("{}.jpg", name),
        birthdate: NaiveDate::from_ymd_opt(2019, 3, 14).unwrap(),
        location: Point::new(lat, lng),
    }
}
