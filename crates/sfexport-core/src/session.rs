//! Shared credential with coalesced refresh.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::Result;
use crate::tokens::AccessToken;
use crate::traits::IdentityProvider;
use crate::types::InstanceUrl;

/// A bearer token together with the base URL it is valid for.
///
/// The pair is replaced as a whole, so a reader never sees a new token
/// with an old URL or the reverse.
#[derive(Clone)]
pub struct Credential {
    access_token: AccessToken,
    instance_url: InstanceUrl,
    generation: u64,
}

impl Credential {
    /// Returns the bearer token.
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Returns the base service URL.
    pub fn instance_url(&self) -> &InstanceUrl {
        &self.instance_url
    }

    /// Returns how many logins produced this credential, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("instance_url", &self.instance_url)
            .field("generation", &self.generation)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated session against the record store.
///
/// Sessions are cheap to clone and safe to share across tasks. Reading the
/// current credential never waits on the network; refreshing is serialized
/// so that an expiry seen by many workers at once costs a single login.
///
/// # Example
///
/// ```no_run
/// # use sfexport_core::{IdentityProvider, Session};
/// # async fn example(provider: impl IdentityProvider) -> sfexport_core::Result<()> {
/// let session = Session::login(provider).await?;
/// let credential = session.current().await;
///
/// // ... a request made with `credential` came back expired:
/// let fresh = session.refresh(credential.generation()).await?;
/// assert!(fresh.generation() > credential.generation());
/// # Ok(())
/// # }
/// ```
pub struct Session<P> {
    inner: Arc<SessionInner<P>>,
}

struct SessionInner<P> {
    provider: P,
    credential: RwLock<Arc<Credential>>,
    refresh_lock: Mutex<()>,
}

impl<P> Clone for Session<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: IdentityProvider> Session<P> {
    /// Log in through `provider` and create a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity endpoint is unreachable or rejects
    /// the credentials.
    #[instrument(skip(provider))]
    pub async fn login(provider: P) -> Result<Self> {
        info!("Creating new session");

        let grant = provider.login().await?;
        let credential = Credential {
            access_token: grant.access_token,
            instance_url: grant.instance_url,
            generation: 1,
        };

        debug!(instance = %credential.instance_url, "Session created successfully");

        Ok(Self {
            inner: Arc::new(SessionInner {
                provider,
                credential: RwLock::new(Arc::new(credential)),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// Returns the latest credential.
    pub async fn current(&self) -> Arc<Credential> {
        Arc::clone(&*self.inner.credential.read().await)
    }

    /// Log in again unconditionally and install the new credential.
    ///
    /// Callers holding an older generation that later call [`refresh`](Self::refresh)
    /// pick up this credential without another login.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity endpoint is unreachable or rejects
    /// the credentials; the previous credential stays installed.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<Arc<Credential>> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.authenticate_locked().await
    }

    /// Replace a credential that was seen to expire.
    ///
    /// `seen_generation` is the generation of the credential the caller was
    /// using. If another caller has already replaced it, the newer credential
    /// is returned without a login round trip.
    #[instrument(skip(self))]
    pub async fn refresh(&self, seen_generation: u64) -> Result<Arc<Credential>> {
        let _guard = self.inner.refresh_lock.lock().await;

        let current = self.current().await;
        if current.generation > seen_generation {
            debug!(
                generation = current.generation,
                "Session already refreshed by another caller"
            );
            return Ok(current);
        }

        self.authenticate_locked().await
    }

    async fn authenticate_locked(&self) -> Result<Arc<Credential>> {
        info!("Refreshing session");

        let grant = self.inner.provider.login().await?;

        let mut slot = self.inner.credential.write().await;
        let next = Arc::new(Credential {
            access_token: grant.access_token,
            instance_url: grant.instance_url,
            generation: slot.generation + 1,
        });
        *slot = Arc::clone(&next);

        debug!(generation = next.generation, "Session refreshed successfully");
        Ok(next)
    }
}

impl<P> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &"[REDACTED]")
            .finish()
    }
}
