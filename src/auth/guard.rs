//! Login and ownership checks that gate write operations

use async_trait::async_trait;

use super::authenticator::Authenticator;
use super::cookie::Exchange;
use crate::error::{Error, Result};
use crate::models::{Author, User};

/// Looks up who authored a resource
#[async_trait]
pub trait OwnerLoader: Send + Sync {
    /// Human-readable resource name used in not-found errors
    fn resource(&self) -> &'static str;

    /// Recorded author, or `None` when the resource does not exist
    async fn owner(&self, resource_id: &str) -> Result<Option<Author>>;
}

/// Admit only authenticated requests.
///
/// Missing cookies and stale sessions are rejected identically.
pub async fn require_login(auth: &Authenticator, exchange: &Exchange) -> Result<User> {
    let user = auth.current_user(exchange).await?;
    if user.is_anonymous() {
        return Err(Error::Unauthorized);
    }
    Ok(user)
}

/// Admit only the author of the target resource; both id and email must match
pub async fn require_ownership(
    auth: &Authenticator,
    exchange: &Exchange,
    loader: &dyn OwnerLoader,
    resource_id: &str,
) -> Result<User> {
    let owner = loader
        .owner(resource_id)
        .await?
        .ok_or_else(|| Error::NotFound(loader.resource().to_string()))?;

    let user = auth.current_user(exchange).await?;
    if !owner.is(&user) {
        tracing::debug!(user_id = user.id, resource_id, "Ownership check failed");
        return Err(Error::Forbidden);
    }
    Ok(user)
}
