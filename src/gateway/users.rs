use tracing::{info, warn};

use crate::auth::CallerContext;
use crate::identity::{Credentials, Identity, IdentityError, Session, UserInput};

use super::{AggregationGateway, GatewayError, GatewayResult};

/// Pass-through operations on the identity service. The gateway adds the
/// caller checks; the identity service stays authoritative for everything
/// else.
impl AggregationGateway {
    pub async fn list_users(&self) -> GatewayResult<Vec<Identity>> {
        Ok(self.identity.fetch_all().await?)
    }

    pub async fn get_user(&self, id: &str) -> GatewayResult<Identity> {
        Ok(self.identity.fetch_by_id(id).await?)
    }

    pub async fn login(&self, credentials: &Credentials) -> GatewayResult<Session> {
        match self.identity.authenticate(credentials).await {
            Ok(session) => {
                info!("User {} logged in", session.user.id);
                Ok(session)
            }
            Err(IdentityError::InvalidCredentials) => {
                warn!("Failed login for {}", credentials.username);
                Err(GatewayError::InvalidCredentials)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn register(&self, input: &UserInput) -> GatewayResult<Identity> {
        let created = self.identity.create(input).await?;
        info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Update the caller's own identity, forwarding their token
    pub async fn update_user(
        &self,
        caller: Option<&CallerContext>,
        input: &UserInput,
    ) -> GatewayResult<Identity> {
        let caller = caller.ok_or(GatewayError::Unauthenticated)?;
        Ok(self.identity.update(&caller.token, input).await?)
    }

    pub async fn delete_user(&self, caller: Option<&CallerContext>) -> GatewayResult<Identity> {
        let caller = caller.ok_or(GatewayError::Unauthenticated)?;
        let removed = self.identity.delete(&caller.token, &caller.id).await?;
        info!("User {} deleted their account", caller.id);
        Ok(removed)
    }

    pub async fn delete_user_as_admin(
        &self,
        caller: Option<&CallerContext>,
        id: &str,
    ) -> GatewayResult<Identity> {
        let caller = caller.ok_or(GatewayError::Unauthenticated)?;
        if !caller.is_admin() {
            warn!("Non-admin {} attempted to delete user {}", caller.id, id);
            return Err(GatewayError::NotAuthorized(
                "deleting other users requires the admin role".to_string(),
            ));
        }
        let removed = self.identity.delete(&caller.token, id).await?;
        info!("Admin {} deleted user {}", caller.id, id);
        Ok(removed)
    }

    /// Identity behind a verified token. A token whose subject no longer
    /// exists is treated as unauthenticated.
    pub async fn check_token(&self, caller: Option<&CallerContext>) -> GatewayResult<Identity> {
        let caller = caller.ok_or(GatewayError::Unauthenticated)?;
        match self.identity.fetch_by_id(&caller.id).await {
            Ok(identity) => Ok(identity),
            Err(IdentityError::NotFound(_)) => Err(GatewayError::Unauthenticated),
            Err(e) => Err(e.into()),
        }
    }
}
