use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Role;
use crate::types::Operation;

/// Claims carried by tokens the identity service issues
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub role: Role,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Authenticated caller attached to a single operation.
///
/// The raw token travels with the context so user management calls can be
/// forwarded to the identity service on the caller's behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerContext {
    pub id: String,
    pub role: Role,
    pub token: String,
}

impl CallerContext {
    pub fn new(id: impl Into<String>, role: Role, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            token: token.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

/// Verify a bearer token and turn its claims into a caller context
pub fn verify_token(token: &str, secret: &str) -> Result<CallerContext, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(CallerContext::new(token_data.claims.id, token_data.claims.role, token))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    NotAuthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Owner-or-admin rule.
///
/// Reads are public. Mutations need a caller, and that caller must either
/// own the item or hold the admin role. Must run before the store is
/// touched.
pub fn authorize(caller: Option<&CallerContext>, operation: Operation, owner: &str) -> Decision {
    if !operation.is_mutation() {
        return Decision::Allow;
    }

    let Some(caller) = caller else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };

    if caller.is_admin() || caller.id == owner {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotAuthorized)
    }
}

/// The same rule as a storage-level write condition: admins match on id
/// alone, everyone else must also match on owner.
pub fn write_guard(caller: &CallerContext) -> Option<&str> {
    if caller.is_admin() {
        None
    } else {
        Some(caller.id.as_str())
    }
}
