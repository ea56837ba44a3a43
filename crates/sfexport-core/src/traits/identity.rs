//! Identity endpoint trait.

use async_trait::async_trait;

use crate::Result;
use crate::tokens::AccessToken;
use crate::types::InstanceUrl;

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    /// Bearer token for REST calls.
    pub access_token: AccessToken,
    /// Base URL the REST calls must go to.
    pub instance_url: InstanceUrl,
}

/// An identity endpoint able to exchange stored credentials for a session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Perform one login round trip.
    async fn login(&self) -> Result<SessionGrant>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for std::sync::Arc<T> {
    async fn login(&self) -> Result<SessionGrant> {
        (**self).login().await
    }
}
