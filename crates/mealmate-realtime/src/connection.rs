//! Connection manager: owns the single live connection for a session.
//!
//! One background task per live connection owns the WebSocket stream. It
//! writes frames handed to it over an `mpsc` channel and dispatches inbound
//! frames to the [`ListenerRegistry`]. Everything else reads state through a
//! [`RealtimeContext`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use mealmate_core::events::Frame;
use mealmate_settings::RealtimeSettings;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::errors::{RealtimeError, Result};
use crate::listeners::{Listener, ListenerId, ListenerRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time allowed for the close handshake before the task is aborted.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Where and how to connect.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Opaque session token, sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
}

impl ConnectionConfig {
    /// Config without a session token.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl From<&RealtimeSettings> for ConnectionConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self::new(settings.url.clone())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Handle describing the live transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// Monotonic per-manager connection number, starting at 1.
    pub id: u64,
    /// URL the transport is connected to.
    pub url: String,
}

/// Observable connection state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// The live transport, if any.
    pub connection: Option<ConnectionHandle>,
    /// Whether frames can be sent.
    pub is_connected: bool,
}

impl ConnectionState {
    fn connected(handle: ConnectionHandle) -> Self {
        Self {
            connection: Some(handle),
            is_connected: true,
        }
    }
}

enum Outbound {
    Frame(String),
    Close,
}

struct Link {
    id: u64,
    tx: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

struct Shared {
    registry: ListenerRegistry,
    state_tx: watch::Sender<ConnectionState>,
    link: Mutex<Option<Link>>,
    connect_gate: tokio::sync::Mutex<()>,
    next_connection: AtomicU64,
}

impl Shared {
    fn publish(&self, state: ConnectionState) {
        let _ = self.state_tx.send_replace(state);
    }

    /// Called by a connection task on exit. Only the current link may flip
    /// the state; a link already taken by `disconnect` is ignored.
    fn release_link(&self, id: u64) {
        let mut link = self.link.lock();
        if link.as_ref().is_some_and(|l| l.id == id) {
            let _ = link.take();
            self.publish(ConnectionState::default());
            info!(connection = id, "real-time connection lost");
        }
    }

    fn deliver(&self, text: &str) {
        match Frame::decode(text) {
            Ok(frame) => {
                let delivered = self.registry.dispatch(&frame.event, &frame.data);
                debug!(event = %frame.event, delivered, "inbound frame");
            }
            Err(e) => warn!(error = %e, "dropping undecodable frame"),
        }
    }
}

/// Owns the single live connection for a session.
///
/// `connect` is idempotent, `disconnect` and `Drop` release the transport.
/// There is no automatic reconnect.
pub struct ConnectionManager {
    config: ConnectionConfig,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::default());
        Self {
            config,
            shared: Arc::new(Shared {
                registry: ListenerRegistry::new(),
                state_tx,
                link: Mutex::new(None),
                connect_gate: tokio::sync::Mutex::new(()),
                next_connection: AtomicU64::new(0),
            }),
        }
    }

    /// Establish the connection.
    ///
    /// Returns immediately when already connected. Concurrent callers wait
    /// for the pending attempt and then observe its result, so at most one
    /// transport exists.
    pub async fn connect(&self) -> Result<()> {
        let _gate = self.shared.connect_gate.lock().await;
        if self.shared.link.lock().is_some() {
            debug!(url = %self.config.url, "already connected");
            return Ok(());
        }

        let request = build_request(&self.config)?;
        let (ws, _) = connect_async(request).await.map_err(|e| {
            warn!(url = %self.config.url, error = %e, "real-time connect failed");
            RealtimeError::Handshake(e.to_string())
        })?;

        let id = self.shared.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();

        // Held across spawn so the task cannot release the link before it is stored.
        let mut link = self.shared.link.lock();
        let task = tokio::spawn(run_connection(ws, rx, Arc::clone(&self.shared), id));
        *link = Some(Link { id, tx, task });
        self.shared.publish(ConnectionState::connected(ConnectionHandle {
            id,
            url: self.config.url.clone(),
        }));
        drop(link);

        info!(connection = id, url = %self.config.url, "real-time connected");
        Ok(())
    }

    /// Close the transport and stop its task. No-op when not connected.
    pub async fn disconnect(&self) {
        let _gate = self.shared.connect_gate.lock().await;
        let Some(link) = self.shared.link.lock().take() else {
            return;
        };
        self.shared.publish(ConnectionState::default());

        let Link { id, tx, task } = link;
        let abort = task.abort_handle();
        let _ = tx.send(Outbound::Close);
        if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
            abort.abort();
        }
        info!(connection = id, "real-time disconnected");
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Whether frames can be sent right now.
    pub fn is_connected(&self) -> bool {
        self.shared.state_tx.borrow().is_connected
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Read-only handle for subscriptions and emitters.
    pub fn context(&self) -> RealtimeContext {
        RealtimeContext {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Configured endpoint.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let link = self.shared.link.lock().take();
        if let Some(link) = link {
            link.task.abort();
            self.shared.publish(ConnectionState::default());
            debug!(connection = link.id, "real-time connection released on drop");
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Cloneable read-only view of a [`ConnectionManager`].
///
/// Cannot connect or disconnect; only observes state, registers listeners,
/// and hands frames to the live transport.
#[derive(Clone)]
pub struct RealtimeContext {
    shared: Arc<Shared>,
}

impl RealtimeContext {
    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Whether frames can be sent right now.
    pub fn is_connected(&self) -> bool {
        self.shared.state_tx.borrow().is_connected
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared.registry.listener_count(event)
    }

    pub(crate) fn on(&self, event: &str, listener: Listener) -> ListenerId {
        self.shared.registry.on(event, listener)
    }

    pub(crate) fn off(&self, event: &str, id: ListenerId) -> bool {
        self.shared.registry.off(event, id)
    }

    #[cfg(test)]
    pub(crate) fn dispatch(&self, event: &str, data: &serde_json::Value) -> usize {
        self.shared.registry.dispatch(event, data)
    }

    /// Queue a frame on the live transport. `false` when there is none.
    pub(crate) fn send(&self, text: String) -> bool {
        match self.shared.link.lock().as_ref() {
            Some(link) => link.tx.send(Outbound::Frame(text)).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for RealtimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeContext")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn build_request(
    config: &ConnectionConfig,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request> {
    let mut request =
        config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidUrl {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;
    if let Some(token) = &config.token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| RealtimeError::InvalidToken)?;
        let _ = request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

/// Releases the link when the connection task ends, however it ends.
struct ReleaseOnExit {
    shared: Arc<Shared>,
    id: u64,
}

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        self.shared.release_link(self.id);
    }
}

async fn run_connection(
    ws: WsStream,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    shared: Arc<Shared>,
    id: u64,
) {
    let _release = ReleaseOnExit {
        shared: Arc::clone(&shared),
        id,
    };
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                        warn!(connection = id, error = %e, "real-time send failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    let _ = ws_tx.close().await;
                    break;
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => shared.deliver(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    debug!(connection = id, ?frame, "server closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection = id, error = %e, "real-time transport error");
                    break;
                }
                None => break,
            },
        }
    }
}
