//! Backend server core: shared state, WebSocket handler and request
//! dispatch.
//!
//! Each WebSocket connection carries its own signed-in identity. The
//! server pushes the identity as soon as the connection opens and again
//! after every signup, login or logout on that connection. Task operations
//! require a signed-in connection and are checked against task ownership.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tasklist_proto::codec;
use tasklist_proto::identity::Identity;
use tasklist_proto::task::TaskId;
use tasklist_proto::wire::{ClientFrame, Failure, Reply, Request, ServerFrame};

use crate::accounts::{AccountError, AccountRegistry};
use crate::documents::{DocumentError, TaskDocuments};

/// Default maximum accepted frame size in bytes (64 KB).
const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Shared backend state: accounts, task documents and limits.
pub struct BackendState {
    /// Identity service accounts.
    pub accounts: AccountRegistry,
    /// Task document store.
    pub documents: TaskDocuments,
    /// Maximum accepted client frame size in bytes.
    max_frame_size: usize,
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendState {
    /// Creates empty state with default limits and no federated account.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: AccountRegistry::new(),
            documents: TaskDocuments::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Creates empty state with a custom frame limit and account registry.
    #[must_use]
    pub fn with_config(max_frame_size: usize, accounts: AccountRegistry) -> Self {
        Self {
            accounts,
            documents: TaskDocuments::new(),
            max_frame_size,
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Push the initial (signed-out) identity.
/// 2. Answer calls in arrival order until the client closes.
pub async fn handle_socket(socket: WebSocket, state: Arc<BackendState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut identity: Option<Identity> = None;

    if let Err(e) = send_frame(&mut ws_sender, &ServerFrame::IdentityChanged(None)).await {
        tracing::warn!(error = %e, "failed to send initial identity");
        return;
    }
    tracing::debug!("client connected");

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Binary(data) => {
                for frame in handle_binary_message(&data, &mut identity, &state).await {
                    if let Err(e) = send_frame(&mut ws_sender, &frame).await {
                        tracing::warn!(error = %e, "WebSocket write failed");
                        return;
                    }
                }
            }
            Message::Close(_) => {
                tracing::debug!("received close frame");
                break;
            }
            _ => {
                // Ignore text, ping, pong frames.
            }
        }
    }

    tracing::debug!(
        user_id = identity.as_ref().map_or("-", |i| i.id.as_str()),
        "client disconnected"
    );
}

/// Answers a frame that cannot be dispatched.
///
/// The failure goes to the originating call when its id can be read, so the
/// caller is not left waiting. Otherwise the connection gets a bare error.
fn reject(data: &[u8], failure: Failure) -> ServerFrame {
    match codec::peek_call_id(data) {
        Some(call_id) => ServerFrame::Reply {
            call_id,
            result: Err(failure),
        },
        None => ServerFrame::Error {
            reason: failure.to_string(),
        },
    }
}

/// Decodes and dispatches one binary frame, returning the frames to send
/// back in order.
async fn handle_binary_message(
    data: &[u8],
    identity: &mut Option<Identity>,
    state: &BackendState,
) -> Vec<ServerFrame> {
    if data.len() > state.max_frame_size {
        tracing::warn!(
            size = data.len(),
            max = state.max_frame_size,
            "frame exceeds size limit"
        );
        let reason = format!(
            "frame too large: {} bytes (max {})",
            data.len(),
            state.max_frame_size
        );
        return vec![reject(data, Failure::InvalidArgument(reason))];
    }

    let ClientFrame::Call { call_id, request } = match codec::decode::<ClientFrame>(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode client frame");
            return vec![reject(data, Failure::Internal(format!("malformed frame: {e}")))];
        }
    };

    let before = identity.clone();
    let result = dispatch(request, identity, state).await;

    let mut frames = Vec::with_capacity(2);
    let signed_in_or_out = matches!(result, Ok(Reply::SignedIn(_))) || *identity != before;
    if signed_in_or_out {
        frames.push(ServerFrame::IdentityChanged(identity.clone()));
    }
    frames.push(ServerFrame::Reply { call_id, result });
    frames
}

/// Executes one request against the backend state.
async fn dispatch(
    request: Request,
    identity: &mut Option<Identity>,
    state: &BackendState,
) -> Result<Reply, Failure> {
    match request {
        Request::Signup { email, password } => {
            let signed_in = state
                .accounts
                .signup(&email, &password)
                .await
                .map_err(auth_failure)?;
            *identity = Some(signed_in.clone());
            Ok(Reply::SignedIn(signed_in))
        }
        Request::Login { email, password } => {
            let signed_in = state
                .accounts
                .login(&email, &password)
                .await
                .map_err(auth_failure)?;
            tracing::info!(user_id = %signed_in.id, "signed in");
            *identity = Some(signed_in.clone());
            Ok(Reply::SignedIn(signed_in))
        }
        Request::LoginFederated { provider } => {
            let signed_in = state
                .accounts
                .login_federated(&provider)
                .await
                .map_err(auth_failure)?;
            tracing::info!(user_id = %signed_in.id, provider = %provider, "federated sign-in");
            *identity = Some(signed_in.clone());
            Ok(Reply::SignedIn(signed_in))
        }
        Request::Logout => {
            if let Some(previous) = identity.take() {
                tracing::info!(user_id = %previous.id, "signed out");
            }
            Ok(Reply::Done)
        }
        Request::ListForOwner { owner_id } => {
            require_owner(identity.as_ref(), &owner_id)?;
            Ok(Reply::Tasks(state.documents.list_for_owner(&owner_id).await))
        }
        Request::Create { owner_id, text } => {
            require_owner(identity.as_ref(), &owner_id)?;
            let id = state
                .documents
                .insert(&owner_id, &text)
                .await
                .map_err(document_failure)?;
            tracing::debug!(task_id = %id, owner_id = %owner_id, "task created");
            Ok(Reply::Created(id))
        }
        Request::Update { task_id, patch } => {
            require_task_owner(identity.as_ref(), &task_id, state).await?;
            state
                .documents
                .patch(&task_id, &patch)
                .await
                .map_err(document_failure)?;
            Ok(Reply::Done)
        }
        Request::Remove { task_id } => {
            require_task_owner(identity.as_ref(), &task_id, state).await?;
            state
                .documents
                .delete(&task_id)
                .await
                .map_err(document_failure)?;
            Ok(Reply::Done)
        }
    }
}

/// Access rule: the connection must be signed in as `owner_id`.
fn require_owner(identity: Option<&Identity>, owner_id: &str) -> Result<(), Failure> {
    let identity = identity.ok_or(Failure::Unauthenticated)?;
    if owner_id.is_empty() {
        return Err(Failure::InvalidArgument("owner id is empty".into()));
    }
    if identity.id != owner_id {
        tracing::warn!(user_id = %identity.id, owner_id, "owner mismatch");
        return Err(Failure::PermissionDenied);
    }
    Ok(())
}

/// Access rule: the connection must own the task `task_id`.
async fn require_task_owner(
    identity: Option<&Identity>,
    task_id: &TaskId,
    state: &BackendState,
) -> Result<(), Failure> {
    let identity = identity.ok_or(Failure::Unauthenticated)?;
    if task_id.is_empty() {
        return Err(Failure::InvalidArgument("task id is empty".into()));
    }
    let task = state
        .documents
        .get(task_id)
        .await
        .ok_or_else(|| Failure::NotFound(task_id.clone()))?;
    if task.owner_id != identity.id {
        tracing::warn!(user_id = %identity.id, task_id = %task_id, "task owned by someone else");
        return Err(Failure::PermissionDenied);
    }
    Ok(())
}

fn auth_failure(err: AccountError) -> Failure {
    tracing::debug!(error = %err, code = err.code(), "auth request failed");
    Failure::Auth {
        code: err.code().to_string(),
    }
}

fn document_failure(err: DocumentError) -> Failure {
    match err {
        DocumentError::InvalidArgument(reason) => Failure::InvalidArgument(reason),
        DocumentError::NotFound(id) => Failure::NotFound(id),
    }
}

/// Encodes and sends one server frame.
async fn send_frame(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frame: &ServerFrame,
) -> Result<(), String> {
    let bytes = codec::encode(frame).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Starts the backend on the given address and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(BackendState::new())).await
}

/// Starts the backend with pre-built state.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<BackendState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "backend server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<BackendState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
