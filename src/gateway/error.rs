use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::auth::DenyReason;
use crate::database::DatabaseError;
use crate::geo::GeoError;
use crate::identity::IdentityError;

/// Everything a gateway operation can fail with
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Identity service unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed identity service response: {0}")]
    MalformedResponse(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl GatewayError {
    pub fn item_not_found(id: Uuid) -> Self {
        GatewayError::NotFound(format!("item {} not found", id))
    }

    pub fn denied(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => GatewayError::Unauthenticated,
            DenyReason::NotAuthorized => {
                GatewayError::NotAuthorized("caller is neither owner nor admin".to_string())
            }
        }
    }
}

impl From<GeoError> for GatewayError {
    fn from(err: GeoError) -> Self {
        match err {
            GeoError::InvalidRegion(msg) => GatewayError::InvalidRegion(msg),
        }
    }
}

impl From<DatabaseError> for GatewayError {
    fn from(err: DatabaseError) -> Self {
        error!("Item store failure: {}", err);
        GatewayError::StorageFailure(err.to_string())
    }
}

impl From<IdentityError> for GatewayError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unreachable(msg) => GatewayError::Unreachable(msg),
            IdentityError::NotFound(id) => GatewayError::NotFound(format!("identity {} not found", id)),
            IdentityError::Unauthorized(_) => GatewayError::Unauthenticated,
            IdentityError::InvalidCredentials => GatewayError::InvalidCredentials,
            IdentityError::Rejected { status, message } => GatewayError::Rejected { status, message },
            IdentityError::MalformedResponse(msg) => {
                error!("Identity service integration error: {}", msg);
                GatewayError::MalformedResponse(msg)
            }
        }
    }
}
