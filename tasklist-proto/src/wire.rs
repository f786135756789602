//! Wire protocol between the `tasklist` client and the backend.
//!
//! Clients send [`ClientFrame::Call`]s tagged with a `call_id`; the backend
//! answers each with a [`ServerFrame::Reply`] carrying the same id. Identity
//! changes are pushed unprompted as [`ServerFrame::IdentityChanged`], first
//! right after the connection opens and then after every sign-in or
//! sign-out on that connection.
//!
//! Frames are postcard-encoded (see [`crate::codec`]) and carried in
//! WebSocket binary messages.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::task::{Task, TaskId, TaskPatch};

/// Frames sent from a client to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientFrame {
    /// Invoke one backend operation.
    Call {
        /// Client-chosen correlation id, echoed in the reply.
        call_id: u64,
        /// The operation to perform.
        request: Request,
    },
}

/// Backend operations a client can invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Fetch every task owned by `owner_id`, newest first.
    ListForOwner {
        /// Owner identity id.
        owner_id: String,
    },
    /// Insert a new task. The backend assigns id and timestamps.
    Create {
        /// Owner identity id.
        owner_id: String,
        /// Task text (already trimmed by the client).
        text: String,
    },
    /// Patch the mutable fields of an existing task.
    Update {
        /// Target task.
        task_id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Delete a task.
    Remove {
        /// Target task.
        task_id: TaskId,
    },
    /// Register a new email/password account and sign it in.
    Signup {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
    /// Sign in with email and password.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
    /// Sign in through a federated identity provider.
    LoginFederated {
        /// Provider name, e.g. `google`.
        provider: String,
    },
    /// Sign the connection out.
    Logout,
}

/// Successful results of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Result of [`Request::ListForOwner`].
    Tasks(Vec<Task>),
    /// Result of [`Request::Create`]: the new task's id.
    Created(TaskId),
    /// Result of operations with no payload.
    Done,
    /// Result of a successful sign-in or signup.
    SignedIn(Identity),
}

/// Reasons the backend refused or failed a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Failure {
    /// The request was malformed (empty id, blank text, ...).
    InvalidArgument(String),
    /// The target task does not exist.
    NotFound(TaskId),
    /// The connection's identity does not own the target.
    PermissionDenied,
    /// A task operation was attempted without signing in.
    Unauthenticated,
    /// An identity operation failed with a provider error code
    /// (e.g. `auth/wrong-password`).
    Auth {
        /// Provider error code.
        code: String,
    },
    /// Anything else that went wrong on the backend.
    Internal(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
            Self::NotFound(id) => write!(f, "task {id} not found"),
            Self::PermissionDenied => f.write_str("permission denied"),
            Self::Unauthenticated => f.write_str("not signed in"),
            Self::Auth { code } => write!(f, "auth error {code}"),
            Self::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

/// Frames sent from the backend to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerFrame {
    /// Answer to a [`ClientFrame::Call`].
    Reply {
        /// The `call_id` of the call being answered.
        call_id: u64,
        /// Outcome of the call.
        result: Result<Reply, Failure>,
    },
    /// The connection's signed-in identity changed (or is being reported
    /// for the first time).
    IdentityChanged(Option<Identity>),
    /// Connection-level error not tied to a call (oversized or
    /// undecodable frame).
    Error {
        /// Human-readable description.
        reason: String,
    },
}
