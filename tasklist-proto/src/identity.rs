//! Authenticated identity issued by the identity service.

use serde::{Deserialize, Serialize};

/// The signed-in user's id/email pair.
///
/// Issued by the identity service; clients read it but never construct
/// one on their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id. Tasks are owned by this value.
    pub id: String,
    /// Email address the account was registered with.
    pub email: String,
}

impl Identity {
    /// Creates an identity. Intended for identity providers.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.id, self.email)
    }
}
