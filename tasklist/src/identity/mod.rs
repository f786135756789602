//! Identity service seam.
//!
//! [`IdentityProvider`] covers account creation, sign-in and sign-out, and
//! a subscription to identity changes. Provider failures arrive as error
//! codes (`auth/wrong-password`, ...) which [`AuthError::from_code`] turns
//! into a fixed set of user-facing messages.

pub mod local;

use std::future::Future;

use parking_lot::Mutex;
use tasklist_proto::identity::Identity;
use tokio::sync::mpsc;

/// Sign-in failures, each carrying its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Unknown user, wrong password or otherwise invalid credential.
    #[error("Invalid email or password.")]
    InvalidCredentials,
    /// Email is not shaped like an address.
    #[error("Invalid email address format.")]
    InvalidEmail,
    /// The account has been disabled.
    #[error("This user account has been disabled.")]
    UserDisabled,
    /// Signup with an email that already has an account.
    #[error("This email address is already registered.")]
    EmailAlreadyInUse,
    /// Signup password below the provider minimum.
    #[error("Password is too weak (should be at least 6 characters).")]
    WeakPassword,
    /// The user dismissed the federated sign-in prompt.
    #[error("Sign-in process cancelled.")]
    PopupClosed,
    /// The federated sign-in prompt could not be shown.
    #[error("Popup blocked. Please enable popups for this site and try again.")]
    PopupBlocked,
    /// The email belongs to an account using another sign-in method.
    #[error(
        "An account already exists with this email address using a different sign-in method."
    )]
    AccountExistsWithDifferentCredential,
    /// The provider could not be reached.
    #[error("Network error. Please check your connection and try again.")]
    NetworkRequestFailed,
    /// The provider is throttling this account.
    #[error("Access temporarily disabled due to too many requests. Please try again later.")]
    TooManyRequests,
    /// Any code without a dedicated message.
    #[error("An unexpected error occurred. Please try again.")]
    Unexpected(String),
}

impl AuthError {
    /// Maps a provider error code to its variant.
    ///
    /// Unknown codes become [`AuthError::Unexpected`] and are logged.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/user-not-found" | "auth/wrong-password" | "auth/invalid-credential" => {
                Self::InvalidCredentials
            }
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/user-disabled" => Self::UserDisabled,
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/weak-password" => Self::WeakPassword,
            "auth/popup-closed-by-user" => Self::PopupClosed,
            "auth/cancelled-popup-request" | "auth/popup-blocked" => Self::PopupBlocked,
            "auth/account-exists-with-different-credential" => {
                Self::AccountExistsWithDifferentCredential
            }
            "auth/network-request-failed" => Self::NetworkRequestFailed,
            "auth/too-many-requests" => Self::TooManyRequests,
            other => {
                tracing::warn!(code = other, "unmapped auth error code");
                Self::Unexpected(other.to_string())
            }
        }
    }

    /// Returns `true` for the user backing out of federated sign-in, which
    /// is not worth showing as an error.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::PopupClosed)
    }
}

/// Receiving end of an identity subscription.
///
/// Yields the provider's current identity first (once known), then every
/// change. Dropping the subscription unsubscribes.
pub struct IdentitySubscription {
    rx: mpsc::UnboundedReceiver<Option<Identity>>,
}

impl IdentitySubscription {
    /// Waits for the next identity notification.
    ///
    /// Returns `None` once the provider has gone away.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        self.rx.recv().await
    }

    /// Returns an already-delivered notification without waiting.
    pub fn try_next(&mut self) -> Option<Option<Identity>> {
        self.rx.try_recv().ok()
    }
}

#[derive(Default)]
struct BroadcasterInner {
    /// Outer `None` means the identity is not known yet.
    current: Option<Option<Identity>>,
    subscribers: Vec<mpsc::UnboundedSender<Option<Identity>>>,
}

/// Fan-out of identity changes to any number of subscriptions.
///
/// Providers own one of these and call [`IdentityBroadcaster::publish`]
/// whenever their signed-in identity changes.
#[derive(Default)]
pub struct IdentityBroadcaster {
    inner: Mutex<BroadcasterInner>,
}

impl IdentityBroadcaster {
    /// Creates a broadcaster whose identity is not known yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broadcaster that already knows the identity.
    #[must_use]
    pub fn with_identity(identity: Option<Identity>) -> Self {
        Self {
            inner: Mutex::new(BroadcasterInner {
                current: Some(identity),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Registers a new subscription, primed with the current identity if
    /// one is known.
    pub fn subscribe(&self) -> IdentitySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if let Some(current) = &inner.current {
            let _ = tx.send(current.clone());
        }
        inner.subscribers.push(tx);
        IdentitySubscription { rx }
    }

    /// Records a new identity and notifies every live subscription.
    pub fn publish(&self, identity: Option<Identity>) {
        let mut inner = self.inner.lock();
        inner.current = Some(identity.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(identity.clone()).is_ok());
        tracing::debug!(
            signed_in = identity.is_some(),
            subscribers = inner.subscribers.len(),
            "identity published"
        );
    }

    /// The last published identity, or `None` if nothing is known yet.
    #[must_use]
    pub fn current(&self) -> Option<Option<Identity>> {
        self.inner.lock().current.clone()
    }

    /// Number of subscriptions that are still alive.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

/// Account and sign-in operations of an identity service.
pub trait IdentityProvider: Send + Sync {
    /// Subscribes to identity changes.
    fn subscribe(&self) -> IdentitySubscription;

    /// Creates an email/password account and signs it in.
    fn signup(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Signs in with email and password.
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Signs in through the configured federated provider.
    fn login_federated(&self) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Signs out.
    fn logout(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}
