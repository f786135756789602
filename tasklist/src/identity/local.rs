//! In-process identity provider for offline mode and tests.

use std::collections::HashMap;

use parking_lot::Mutex;
use tasklist_proto::identity::Identity;

use super::{AuthError, IdentityBroadcaster, IdentityProvider, IdentitySubscription};

const MIN_PASSWORD_LEN: usize = 6;

struct LocalAccount {
    identity: Identity,
    password: Option<String>,
    disabled: bool,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, LocalAccount>,
    federated_email: Option<String>,
    cancel_next_federated: bool,
    fail_next_logout: bool,
}

/// Identity provider that keeps accounts in memory.
///
/// Starts signed out. Federated sign-in resolves to a single configured
/// email and is refused when none is set.
pub struct LocalIdentityProvider {
    inner: Mutex<Inner>,
    broadcaster: IdentityBroadcaster,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    /// Creates a provider with no accounts, signed out.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            broadcaster: IdentityBroadcaster::with_identity(None),
        }
    }

    /// Enables federated sign-in as `email`.
    #[must_use]
    pub fn with_federated_account(self, email: impl Into<String>) -> Self {
        self.inner.lock().federated_email = Some(email.into().trim().to_lowercase());
        self
    }

    /// Enables or disables an account. Returns `false` if it doesn't exist.
    pub fn set_disabled(&self, email: &str, disabled: bool) -> bool {
        let key = email.trim().to_lowercase();
        self.inner
            .lock()
            .accounts
            .get_mut(&key)
            .is_some_and(|account| {
                account.disabled = disabled;
                true
            })
    }

    /// Makes the next federated sign-in behave as if the user closed the
    /// provider prompt.
    pub fn cancel_next_federated(&self) {
        self.inner.lock().cancel_next_federated = true;
    }

    /// Makes the next logout fail with a network error.
    pub fn fail_next_logout(&self) {
        self.inner.lock().fail_next_logout = true;
    }

    /// Number of live identity subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    fn sign_in(&self, identity: Identity) -> Identity {
        tracing::info!(user_id = %identity.id, "signed in");
        self.broadcaster.publish(Some(identity.clone()));
        identity
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn subscribe(&self) -> IdentitySubscription {
        self.broadcaster.subscribe()
    }

    async fn signup(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let key = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let identity = {
            let mut inner = self.inner.lock();
            if inner.accounts.contains_key(&key) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let identity = Identity::new(uuid::Uuid::now_v7().to_string(), key.clone());
            inner.accounts.insert(
                key,
                LocalAccount {
                    identity: identity.clone(),
                    password: Some(password.to_string()),
                    disabled: false,
                },
            );
            identity
        };
        Ok(self.sign_in(identity))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let key = validate_email(email)?;
        let identity = {
            let inner = self.inner.lock();
            let account = inner
                .accounts
                .get(&key)
                .ok_or(AuthError::InvalidCredentials)?;
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }
            if account.password.as_deref() != Some(password) {
                return Err(AuthError::InvalidCredentials);
            }
            account.identity.clone()
        };
        Ok(self.sign_in(identity))
    }

    async fn login_federated(&self) -> Result<Identity, AuthError> {
        let identity = {
            let mut inner = self.inner.lock();
            if std::mem::take(&mut inner.cancel_next_federated) {
                return Err(AuthError::PopupClosed);
            }
            let Some(email) = inner.federated_email.clone() else {
                return Err(AuthError::from_code("auth/operation-not-allowed"));
            };
            let account = inner
                .accounts
                .entry(email.clone())
                .or_insert_with(|| LocalAccount {
                    identity: Identity::new(uuid::Uuid::now_v7().to_string(), email),
                    password: None,
                    disabled: false,
                });
            if account.password.is_some() {
                return Err(AuthError::AccountExistsWithDifferentCredential);
            }
            if account.disabled {
                return Err(AuthError::UserDisabled);
            }
            account.identity.clone()
        };
        Ok(self.sign_in(identity))
    }

    async fn logout(&self) -> Result<(), AuthError> {
        if std::mem::take(&mut self.inner.lock().fail_next_logout) {
            return Err(AuthError::NetworkRequestFailed);
        }
        self.broadcaster.publish(None);
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    });
    if !valid || email.contains(char::is_whitespace) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}
