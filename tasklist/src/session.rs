//! Session context: the current identity, shared with whoever needs it.
//!
//! [`SessionContext::start`] subscribes to the identity provider once and
//! spawns a listener that folds every notification into a
//! [`tokio::sync::watch`] channel. Consumers get the context passed in
//! explicitly and either take a snapshot ([`SessionContext::current_session`])
//! or hold a receiver ([`SessionContext::watch`]).
//!
//! Until the first notification arrives the session is loading. If none
//! arrives within the auth timeout the session settles as signed out; a
//! later notification still applies.

use std::sync::Arc;
use std::time::Duration;

use tasklist_proto::identity::Identity;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::identity::{AuthError, IdentityProvider, IdentitySubscription};

/// Default wait for the first identity notification.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Signed-in identity, if any.
    pub identity: Option<Identity>,
    /// `true` until the identity is first known.
    pub loading: bool,
}

impl Session {
    /// The state before the first notification.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    /// A settled session for `identity`.
    #[must_use]
    pub const fn settled(identity: Option<Identity>) -> Self {
        Self {
            identity,
            loading: false,
        }
    }
}

/// Owns the identity subscription and publishes [`Session`] updates.
///
/// Dropping the context (or calling [`SessionContext::shutdown`]) stops the
/// listener and releases the subscription.
pub struct SessionContext<P> {
    provider: Arc<P>,
    session: watch::Receiver<Session>,
    listener: JoinHandle<()>,
}

impl<P: IdentityProvider + 'static> SessionContext<P> {
    /// Subscribes to `provider` and starts listening for identity changes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(provider: Arc<P>, auth_timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(Session::loading());
        let subscription = provider.subscribe();
        let listener = tokio::spawn(listen(subscription, tx, auth_timeout));
        Self {
            provider,
            session: rx,
            listener,
        }
    }

    /// Current session snapshot.
    #[must_use]
    pub fn current_session(&self) -> Session {
        self.session.borrow().clone()
    }

    /// A receiver that observes every session change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.session.clone()
    }

    /// The provider behind this session.
    #[must_use]
    pub const fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports.
    pub async fn signup(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.provider.signup(email, password).await
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.provider.login(email, password).await
    }

    /// Signs in through the federated provider.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports.
    pub async fn login_federated(&self) -> Result<Identity, AuthError> {
        self.provider.login_federated().await
    }

    /// Signs out.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.provider.logout().await
    }
}

impl<P> SessionContext<P> {
    /// Stops listening and drops the identity subscription.
    pub fn shutdown(&self) {
        self.listener.abort();
    }
}

impl<P> Drop for SessionContext<P> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    mut subscription: IdentitySubscription,
    tx: watch::Sender<Session>,
    auth_timeout: Duration,
) {
    match tokio::time::timeout(auth_timeout, subscription.next()).await {
        Ok(Some(identity)) => publish(&tx, identity),
        Ok(None) => {
            tracing::warn!("identity provider closed before reporting an identity");
            tx.send_replace(Session::settled(None));
            return;
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = u64::try_from(auth_timeout.as_millis()).unwrap_or(u64::MAX),
                "no identity notification in time, treating as signed out"
            );
            tx.send_replace(Session::settled(None));
        }
    }

    while let Some(identity) = subscription.next().await {
        publish(&tx, identity);
    }
    tracing::debug!("identity subscription ended");
}

fn publish(tx: &watch::Sender<Session>, identity: Option<Identity>) {
    tracing::debug!(
        user_id = identity.as_ref().map_or("-", |i| i.id.as_str()),
        "session updated"
    );
    tx.send_replace(Session::settled(identity));
}
