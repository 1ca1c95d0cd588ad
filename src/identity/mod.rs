//! Read-through view of the remote identity service.
//!
//! The gateway never owns identity state. Everything here either fetches
//! identities for owner hydration or forwards caller-initiated user
//! management calls to the service that does.

pub mod cache;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::CachedIdentityClient;
pub use http::HttpIdentityClient;

/// Role as assigned by the identity service. The gateway only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Identity record as exposed to consumers of the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
}

/// Login request forwarded to `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// User fields forwarded on register and update. Absent fields are left
/// untouched by the identity service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Successful login: the identity plus the bearer token the service issued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentityError {
    #[error("Identity service unreachable: {0}")]
    Unreachable(String),

    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("Identity service rejected the caller token: {0}")]
    Unauthorized(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed identity service response: {0}")]
    MalformedResponse(String),
}

/// Capability interface over the identity service. Every call is a single
/// attempt; retry policy belongs to the caller.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn fetch_by_id(&self, id: &str) -> Result<Identity, IdentityError>;

    async fn fetch_all(&self) -> Result<Vec<Identity>, IdentityError>;

    async fn create(&self, input: &UserInput) -> Result<Identity, IdentityError>;

    /// Update the identity the token belongs to
    async fn update(&self, token: &str, input: &UserInput) -> Result<Identity, IdentityError>;

    async fn delete(&self, token: &str, id: &str) -> Result<Identity, IdentityError>;

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, IdentityError>;
}
