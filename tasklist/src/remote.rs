//! WebSocket client for the development backend.
//!
//! [`RemoteBackend`] implements both [`TaskService`] and
//! [`IdentityProvider`] over one WebSocket connection. Every operation is
//! sent as a [`ClientFrame::Call`] with a fresh `call_id` and parked in a
//! pending-call table until the background reader sees the matching
//! [`ServerFrame::Reply`]. Identity notifications pushed by the backend are
//! fanned out to subscribers.
//!
//! When the connection drops, every pending call fails and later calls fail
//! immediately. There is no reconnection and no per-call timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tasklist_proto::codec::{self, CodecError};
use tasklist_proto::identity::Identity;
use tasklist_proto::task::{Task, TaskId, TaskPatch};
use tasklist_proto::wire::{ClientFrame, Failure, Reply, Request, ServerFrame};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::identity::{AuthError, IdentityBroadcaster, IdentityProvider, IdentitySubscription};
use crate::service::{
    ServiceError, TaskService, validate_create, validate_owner, validate_task_id, validate_update,
};

/// Write half of the backend WebSocket.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Read half of the backend WebSocket.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

type PendingCalls = HashMap<u64, oneshot::Sender<Result<Reply, Failure>>>;

/// Errors from the connection itself, below the service and identity
/// error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The URL is not a `ws://` or `wss://` URL.
    #[error("invalid backend URL {url}: {reason}")]
    InvalidUrl {
        /// URL as given.
        url: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Connecting took longer than the connect timeout.
    #[error("timed out connecting to backend")]
    Timeout,
    /// Nothing is listening at the backend address.
    #[error("backend unreachable at {0}")]
    Unreachable(String),
    /// The connection is closed.
    #[error("connection to backend closed")]
    ConnectionClosed,
    /// Lower-level WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    /// A frame could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The backend answered the call with a failure.
    #[error("backend refused the call: {0}")]
    Failure(Failure),
    /// The backend answered with a reply of the wrong kind.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Upper bound on the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Provider name sent with federated sign-in.
    pub federated_provider: String,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            federated_provider: "google".to_string(),
        }
    }
}

/// State shared with the reader task.
struct Shared {
    pending: Mutex<PendingCalls>,
    connected: AtomicBool,
    identity: IdentityBroadcaster,
}

/// Task service and identity provider backed by the development backend.
pub struct RemoteBackend {
    url: String,
    options: RemoteOptions,
    ws_sender: tokio::sync::Mutex<WsSender>,
    next_call_id: AtomicU64,
    shared: Arc<Shared>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl RemoteBackend {
    /// Connects to the backend at `url` (e.g. `ws://127.0.0.1:9100/ws`).
    ///
    /// # Errors
    ///
    /// - [`RemoteError::InvalidUrl`] if `url` is not a WebSocket URL.
    /// - [`RemoteError::Timeout`] if the handshake exceeds the connect timeout.
    /// - [`RemoteError::Unreachable`] / [`RemoteError::WebSocket`] if it fails.
    pub async fn connect(url: &str, options: RemoteOptions) -> Result<Self, RemoteError> {
        let parsed = url::Url::parse(url).map_err(|e| RemoteError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(RemoteError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let (ws_stream, _response) =
            tokio::time::timeout(options.connect_timeout, connect_async(url))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "backend WebSocket connect timed out");
                    RemoteError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, error = %e, "backend WebSocket connect failed");
                    map_ws_connect_error(url, e)
                })?;

        let (ws_sender, ws_reader) = ws_stream.split();
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            identity: IdentityBroadcaster::new(),
        });
        let reader_handle = tokio::spawn(reader_loop(ws_reader, Arc::clone(&shared)));
        tracing::info!(url, "connected to backend");

        Ok(Self {
            url: url.to_string(),
            options,
            ws_sender: tokio::sync::Mutex::new(ws_sender),
            next_call_id: AtomicU64::new(1),
            shared,
            reader_handle,
        })
    }

    /// The URL this client connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the connection is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Sends one call and waits for its reply.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Failure`] when the backend refuses the call,
    /// [`RemoteError::ConnectionClosed`] when the connection is or goes down.
    pub async fn call(&self, request: Request) -> Result<Reply, RemoteError> {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let bytes = codec::encode(&ClientFrame::Call { call_id, request })?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock();
            if !self.shared.connected.load(Ordering::SeqCst) {
                return Err(RemoteError::ConnectionClosed);
            }
            pending.insert(call_id, tx);
        }

        let sent = self
            .ws_sender
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await;
        if let Err(e) = sent {
            tracing::warn!(call_id, error = %e, "backend send failed");
            self.shared.pending.lock().remove(&call_id);
            self.shared.connected.store(false, Ordering::SeqCst);
            return Err(RemoteError::ConnectionClosed);
        }

        match rx.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(failure)) => Err(RemoteError::Failure(failure)),
            Err(_) => Err(RemoteError::ConnectionClosed),
        }
    }

    async fn sign_in(&self, request: Request) -> Result<Identity, AuthError> {
        match self.call(request).await {
            Ok(Reply::SignedIn(identity)) => Ok(identity),
            Ok(other) => {
                tracing::warn!(?other, "unexpected reply to sign-in");
                Err(AuthError::Unexpected("unexpected-reply".to_string()))
            }
            Err(e) => Err(auth_error(e)),
        }
    }
}

impl Drop for RemoteBackend {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

impl TaskService for RemoteBackend {
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Task>, ServiceError> {
        validate_owner(owner_id)?;
        let request = Request::ListForOwner {
            owner_id: owner_id.to_string(),
        };
        match self.call(request).await {
            Ok(Reply::Tasks(tasks)) => Ok(tasks),
            Ok(other) => Err(ServiceError::Fetch(format!("unexpected reply: {other:?}"))),
            Err(e) => Err(service_error(e, ServiceError::Fetch)),
        }
    }

    async fn create(&self, owner_id: &str, text: &str) -> Result<TaskId, ServiceError> {
        let text = validate_create(owner_id, text)?;
        let request = Request::Create {
            owner_id: owner_id.to_string(),
            text,
        };
        match self.call(request).await {
            Ok(Reply::Created(id)) => Ok(id),
            Ok(other) => Err(ServiceError::Write(format!("unexpected reply: {other:?}"))),
            Err(e) => Err(service_error(e, ServiceError::Write)),
        }
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<(), ServiceError> {
        let patch = validate_update(id, patch)?;
        let request = Request::Update {
            task_id: id.clone(),
            patch,
        };
        match self.call(request).await {
            Ok(Reply::Done) => Ok(()),
            Ok(other) => Err(ServiceError::Write(format!("unexpected reply: {other:?}"))),
            Err(e) => Err(service_error(e, ServiceError::Write)),
        }
    }

    async fn remove(&self, id: &TaskId) -> Result<(), ServiceError> {
        validate_task_id(id)?;
        match self.call(Request::Remove { task_id: id.clone() }).await {
            Ok(Reply::Done) => Ok(()),
            Err(RemoteError::Failure(Failure::NotFound(_))) => {
                tracing::debug!(task_id = %id, "remove of absent task");
                Ok(())
            }
            Ok(other) => Err(ServiceError::Write(format!("unexpected reply: {other:?}"))),
            Err(e) => Err(service_error(e, ServiceError::Write)),
        }
    }
}

impl IdentityProvider for RemoteBackend {
    fn subscribe(&self) -> IdentitySubscription {
        self.shared.identity.subscribe()
    }

    async fn signup(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.sign_in(Request::Signup {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.sign_in(Request::Login {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
    }

    async fn login_federated(&self) -> Result<Identity, AuthError> {
        self.sign_in(Request::LoginFederated {
            provider: self.options.federated_provider.clone(),
        })
        .await
    }

    async fn logout(&self) -> Result<(), AuthError> {
        match self.call(Request::Logout).await {
            Ok(Reply::Done) => Ok(()),
            Ok(other) => {
                tracing::warn!(?other, "unexpected reply to logout");
                Err(AuthError::Unexpected("unexpected-reply".to_string()))
            }
            Err(e) => Err(auth_error(e)),
        }
    }
}

/// Maps a call error onto the service error taxonomy. `fallback` builds
/// the variant for store failures (`Fetch` for reads, `Write` for writes).
fn service_error(err: RemoteError, fallback: fn(String) -> ServiceError) -> ServiceError {
    match err {
        RemoteError::Failure(Failure::InvalidArgument(reason)) => {
            ServiceError::InvalidArgument(reason)
        }
        RemoteError::Failure(Failure::NotFound(id)) => ServiceError::NotFound(id),
        other => fallback(other.to_string()),
    }
}

fn auth_error(err: RemoteError) -> AuthError {
    match err {
        RemoteError::Failure(Failure::Auth { code }) => AuthError::from_code(&code),
        RemoteError::ConnectionClosed | RemoteError::WebSocket(_) => {
            AuthError::NetworkRequestFailed
        }
        other => {
            tracing::warn!(error = %other, "auth call failed");
            AuthError::Unexpected(other.to_string())
        }
    }
}

/// Reads server frames until the connection ends.
///
/// Replies are routed to their pending call, identity notifications go to
/// the broadcaster. A bare error frame fails every pending call. Malformed
/// frames are logged and skipped. On exit the
/// connection is marked closed and every pending call fails.
async fn reader_loop(mut ws_reader: WsReader, shared: Arc<Shared>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match codec::decode::<ServerFrame>(&data) {
                Ok(ServerFrame::Reply { call_id, result }) => {
                    let waiter = shared.pending.lock().remove(&call_id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(result);
                        }
                        None => tracing::debug!(call_id, "reply for unknown call"),
                    }
                }
                Ok(ServerFrame::IdentityChanged(identity)) => {
                    shared.identity.publish(identity);
                }
                Ok(ServerFrame::Error { reason }) => {
                    // Not tied to a call, so no waiter can be singled out.
                    let failed: Vec<_> = shared.pending.lock().drain().collect();
                    tracing::warn!(
                        reason = %reason,
                        failed = failed.len(),
                        "backend reported an error"
                    );
                    for (_, tx) in failed {
                        let _ = tx.send(Err(Failure::Internal(reason.clone())));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed backend frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("backend closed the connection");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(error = %e, "backend WebSocket read error");
                break;
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    let abandoned: Vec<_> = shared.pending.lock().drain().collect();
    if !abandoned.is_empty() {
        tracing::warn!(count = abandoned.len(), "failing calls pending at disconnect");
    }
    // Dropping the senders fails each waiting call.
    drop(abandoned);
    tracing::info!("backend reader task exiting");
}

fn map_ws_connect_error(url: &str, err: tokio_tungstenite::tungstenite::Error) -> RemoteError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err)
            if matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::AddrNotAvailable
            ) =>
        {
            RemoteError::Unreachable(url.to_string())
        }
        WsError::Http(response) => {
            RemoteError::WebSocket(format!("HTTP error: status {}", response.status()))
        }
        other => RemoteError::WebSocket(other.to_string()),
    }
}
