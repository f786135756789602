//! In-memory account registry for the development identity service.
//!
//! Accounts are keyed by lowercase email. Password accounts store a salted
//! SHA-256 digest; federated accounts have no password and can only sign
//! in through [`AccountRegistry::login_federated`]. Failures carry the
//! provider error codes that clients map to user-facing messages.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tasklist_proto::identity::Identity;
use tokio::sync::RwLock;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Default number of consecutive failed logins before an email is locked.
const DEFAULT_MAX_FAILED_LOGINS: u32 = 5;

/// Identity-service failures, each tied to a provider error code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// Email is not shaped like an address.
    #[error("invalid email address")]
    InvalidEmail,
    /// Password shorter than [`MIN_PASSWORD_LEN`].
    #[error("password too weak")]
    WeakPassword,
    /// An account with this email already exists.
    #[error("email already in use")]
    EmailAlreadyInUse,
    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredential,
    /// The account exists but has been disabled.
    #[error("account disabled")]
    UserDisabled,
    /// Too many consecutive failed logins for this email.
    #[error("too many failed login attempts")]
    TooManyRequests,
    /// Federated email is owned by a password account.
    #[error("account exists with a different sign-in method")]
    DifferentCredential,
    /// No federated account is configured for this provider.
    #[error("federated sign-in not enabled for {0}")]
    FederatedNotAllowed(String),
}

impl AccountError {
    /// Provider error code reported to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "auth/invalid-email",
            Self::WeakPassword => "auth/weak-password",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::InvalidCredential => "auth/invalid-credential",
            Self::UserDisabled => "auth/user-disabled",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::DifferentCredential => "auth/account-exists-with-different-credential",
            Self::FederatedNotAllowed(_) => "auth/operation-not-allowed",
        }
    }
}

/// How an account signs in.
#[derive(Debug, Clone)]
enum Credential {
    /// Email and password, stored as salt + SHA-256 digest (hex).
    Password { salt: String, digest: String },
    /// Federated provider name.
    Federated { provider: String },
}

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    credential: Credential,
    disabled: bool,
    failed_logins: u32,
}

/// Registry of accounts known to the development identity service.
pub struct AccountRegistry {
    accounts: RwLock<HashMap<String, Account>>,
    federated_email: Option<String>,
    max_failed_logins: u32,
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRegistry {
    /// Creates an empty registry with no federated account.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            federated_email: None,
            max_failed_logins: DEFAULT_MAX_FAILED_LOGINS,
        }
    }

    /// Creates a registry with a federated account email and lockout limit.
    #[must_use]
    pub fn with_config(federated_email: Option<String>, max_failed_logins: u32) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            federated_email: federated_email.map(|e| e.trim().to_lowercase()),
            max_failed_logins,
        }
    }

    /// Registers a new password account.
    ///
    /// # Errors
    ///
    /// [`AccountError::InvalidEmail`], [`AccountError::WeakPassword`] or
    /// [`AccountError::EmailAlreadyInUse`].
    pub async fn signup(&self, email: &str, password: &str) -> Result<Identity, AccountError> {
        let key = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword);
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(AccountError::EmailAlreadyInUse);
        }

        let salt = new_salt();
        let digest = hash_password(&salt, password);
        let identity = Identity::new(uuid::Uuid::now_v7().to_string(), key.clone());
        accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                credential: Credential::Password { salt, digest },
                disabled: false,
                failed_logins: 0,
            },
        );
        tracing::info!(user_id = %identity.id, "account created");
        Ok(identity)
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// [`AccountError::InvalidEmail`], [`AccountError::InvalidCredential`],
    /// [`AccountError::UserDisabled`] or [`AccountError::TooManyRequests`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AccountError> {
        let key = validate_email(email)?;
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&key) else {
            return Err(AccountError::InvalidCredential);
        };

        if account.failed_logins >= self.max_failed_logins {
            return Err(AccountError::TooManyRequests);
        }
        if account.disabled {
            return Err(AccountError::UserDisabled);
        }

        let Credential::Password { salt, digest } = &account.credential else {
            return Err(AccountError::InvalidCredential);
        };
        if hash_password(salt, password) != *digest {
            account.failed_logins += 1;
            tracing::debug!(
                user_id = %account.identity.id,
                failed = account.failed_logins,
                "password mismatch"
            );
            return Err(AccountError::InvalidCredential);
        }

        account.failed_logins = 0;
        Ok(account.identity.clone())
    }

    /// Signs in (creating the account on first use) through a federated
    /// provider. The development backend stands in for the provider with a
    /// single configured email.
    ///
    /// # Errors
    ///
    /// [`AccountError::FederatedNotAllowed`] when no federated email is
    /// configured, [`AccountError::DifferentCredential`] when a password
    /// account owns that email, [`AccountError::UserDisabled`].
    pub async fn login_federated(&self, provider: &str) -> Result<Identity, AccountError> {
        let Some(email) = self.federated_email.clone() else {
            return Err(AccountError::FederatedNotAllowed(provider.to_string()));
        };

        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(email.clone()).or_insert_with(|| {
            tracing::info!(provider, "creating federated account");
            Account {
                identity: Identity::new(uuid::Uuid::now_v7().to_string(), email),
                credential: Credential::Federated {
                    provider: provider.to_string(),
                },
                disabled: false,
                failed_logins: 0,
            }
        });

        match &account.credential {
            Credential::Password { .. } => Err(AccountError::DifferentCredential),
            Credential::Federated { .. } if account.disabled => Err(AccountError::UserDisabled),
            Credential::Federated { .. } => Ok(account.identity.clone()),
        }
    }

    /// Enables or disables an account. Returns `false` if it doesn't exist.
    pub async fn set_disabled(&self, email: &str, disabled: bool) -> bool {
        let key = email.trim().to_lowercase();
        let mut accounts = self.accounts.write().await;
        accounts.get_mut(&key).is_some_and(|account| {
            account.disabled = disabled;
            true
        })
    }
}

/// Checks email shape and returns the normalized registry key.
fn validate_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AccountError::InvalidEmail);
    };
    let domain_ok = domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
    if local.is_empty() || !domain_ok || email.contains(char::is_whitespace) {
        return Err(AccountError::InvalidEmail);
    }
    Ok(email)
}

fn new_salt() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
