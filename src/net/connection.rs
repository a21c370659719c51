//! Connection manager for the realtime issue socket.
//!
//! DESIGN
//! ======
//! One `ConnectionManager` owns at most one live socket. Each `connect()`
//! spawns a task that opens the socket through the [`Connector`] and then
//! runs a `select!` loop:
//! - inbound text → decode → liveness no-op or publish to the dispatcher
//! - outbound commands (probe text, close) → socket
//!
//! Every spawned task is stamped with an epoch. Only the task holding the
//! current epoch may write connection state or schedule a reconnect, so a
//! socket still winding down after a newer `connect()` cannot clobber it.
//!
//! LIFECYCLE
//! =========
//! DISCONNECTED → CONNECTING → OPEN → DISCONNECTED. `disconnect()` passes
//! through CLOSING and suppresses reconnection; before the handshake is done
//! it aborts the opening task outright. Any other closure, including a failed
//! or timed-out open, claims a slot from [`Backoff`] and schedules a reconnect.
//! Once the slots are used up the manager stays DISCONNECTED until someone
//! calls `connect()` again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use frames::{FrameType, OutboundFrame};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::backoff::{Backoff, ReconnectPolicy};
use super::connector::{Connector, Socket, WsConnector};
use crate::dispatch::EventDispatcher;

/// Socket lifecycle position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
}

enum Outbound {
    Text(String),
    Close,
}

#[derive(Default)]
struct Link {
    epoch: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    closing: bool,
    backoff: Backoff,
    socket_task: Option<JoinHandle<()>>,
    pending_reconnect: Option<JoinHandle<()>>,
}

struct Inner {
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    dispatcher: EventDispatcher,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Link>,
}

/// Cloneable handle to the session's single socket.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Manager that opens real websockets via `tokio-tungstenite`.
    #[must_use]
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy, dispatcher: EventDispatcher) -> Self {
        Self::with_connector(url, policy, dispatcher, Arc::new(WsConnector))
    }

    #[must_use]
    pub fn with_connector(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        dispatcher: EventDispatcher,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                policy,
                connector,
                dispatcher,
                state,
                link: Mutex::new(Link::default()),
            }),
        }
    }

    /// Open the socket unless it is already connecting or open.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        self.inner.start(false);
    }

    /// Close the socket cleanly and cancel any scheduled reconnect. A socket
    /// still in its handshake is abandoned immediately.
    pub fn disconnect(&self) {
        let mut link = self.inner.lock_link();
        if let Some(pending) = link.pending_reconnect.take() {
            pending.abort();
        }
        match *self.inner.state.borrow() {
            ConnectionState::Disconnected | ConnectionState::Closing => return,
            ConnectionState::Connecting | ConnectionState::Open => {}
        }
        link.closing = true;
        self.inner.state.send_replace(ConnectionState::Closing);
        tracing::info!(url = %self.inner.url, "ws: disconnect requested");

        if let Some(tx) = link.outbound.take() {
            let _ = tx.send(Outbound::Close);
            return;
        }
        // Still in the handshake: nothing to close on the wire.
        if let Some(task) = link.socket_task.take() {
            task.abort();
        }
        link.epoch += 1;
        link.closing = false;
        self.inner.state.send_replace(ConnectionState::Disconnected);
        tracing::info!(url = %self.inner.url, "ws: connect abandoned");
    }

    /// Send a timestamped `ping`. Dropped with a warning unless OPEN.
    ///
    /// Returns `true` if the probe was handed to the socket task.
    pub fn ping(&self) -> bool {
        self.send(&OutboundFrame::Ping { timestamp: now_millis() })
    }

    fn send(&self, frame: &OutboundFrame) -> bool {
        let link = self.inner.lock_link();
        let state = *self.inner.state.borrow();
        let Some(tx) = link.outbound.as_ref().filter(|_| state == ConnectionState::Open) else {
            tracing::warn!(?state, "ws: not connected, dropping outbound frame");
            return false;
        };
        match frames::encode_frame(frame) {
            Ok(text) => tx.send(Outbound::Text(text)).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "ws: failed to encode outbound frame");
                false
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Reconnect slots used since the last successful open.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.inner.lock_link().backoff.attempts()
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }
}

impl Inner {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(self: &Arc<Self>, from_timer: bool) {
        let mut link = self.lock_link();
        match *self.state.borrow() {
            ConnectionState::Connecting | ConnectionState::Open => {
                tracing::debug!(url = %self.url, "ws: connect ignored, already active");
                return;
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {}
        }
        if let Some(pending) = link.pending_reconnect.take() {
            if !from_timer {
                pending.abort();
            }
        }
        link.epoch += 1;
        link.closing = false;
        link.outbound = None;
        let epoch = link.epoch;
        self.state.send_replace(ConnectionState::Connecting);
        tracing::info!(url = %self.url, epoch, "ws: connecting");
        link.socket_task = Some(tokio::spawn(run_socket(Arc::clone(self), epoch)));
    }

    /// Register the outbound channel for a freshly opened socket. Returns
    /// `false` when the socket should be closed straight away.
    fn on_open(&self, epoch: u64, tx: mpsc::UnboundedSender<Outbound>) -> bool {
        let mut link = self.lock_link();
        if link.epoch != epoch || link.closing {
            return false;
        }
        link.outbound = Some(tx);
        link.backoff.reset();
        self.state.send_replace(ConnectionState::Open);
        tracing::info!(url = %self.url, epoch, "ws: connected");
        true
    }

    fn on_closed(self: &Arc<Self>, epoch: u64) {
        let mut link = self.lock_link();
        if link.epoch != epoch {
            tracing::debug!(epoch, current = link.epoch, "ws: superseded socket closed");
            return;
        }
        link.outbound = None;
        let intentional = std::mem::take(&mut link.closing);
        self.state.send_replace(ConnectionState::Disconnected);

        if intentional {
            tracing::info!(url = %self.url, "ws: disconnected cleanly");
            return;
        }

        match link.backoff.next_attempt(&self.policy) {
            Some((attempt, delay)) => {
                tracing::warn!(
                    url = %self.url,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "ws: connection lost, scheduling reconnect"
                );
                link.pending_reconnect = Some(tokio::spawn(reconnect_after(Arc::clone(self), delay)));
            }
            None => {
                tracing::error!(
                    url = %self.url,
                    max_attempts = self.policy.max_attempts,
                    "ws: reconnect attempts exhausted, staying disconnected"
                );
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let frame = match frames::decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "ws: dropping malformed frame");
                return;
            }
        };

        match frame.frame_type() {
            Some(FrameType::ConnectionEstablished) => {
                tracing::debug!(message = ?frame.message, "ws: connection established");
            }
            Some(FrameType::Pong) => {
                tracing::debug!(timestamp = ?frame.timestamp, "ws: pong");
            }
            Some(FrameType::Error) => {
                tracing::warn!(message = ?frame.message, "ws: server reported error");
            }
            Some(kind) => {
                let payload = frame.data.unwrap_or(Value::Null);
                let delivered = self.dispatcher.publish(kind.as_str(), &payload);
                tracing::debug!(event = kind.as_str(), delivered, "ws: event dispatched");
            }
            None => {
                tracing::info!(kind = %frame.kind, "ws: ignoring unrecognized frame type");
            }
        }
    }
}

async fn reconnect_after(inner: Arc<Inner>, delay: Duration) {
    tokio::time::sleep(delay).await;
    inner.start(true);
}

async fn run_socket(inner: Arc<Inner>, epoch: u64) {
    let deadline = inner.policy.connect_timeout;
    let opened = tokio::time::timeout(deadline, inner.connector.connect(&inner.url)).await;
    let Socket { mut sink, mut stream } = match opened {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => {
            tracing::warn!(url = %inner.url, error = %e, "ws: connect failed");
            inner.on_closed(epoch);
            return;
        }
        Err(_) => {
            tracing::warn!(
                url = %inner.url,
                timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                "ws: handshake timed out"
            );
            inner.on_closed(epoch);
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    if !inner.on_open(epoch, tx) {
        let _ = sink.close().await;
        inner.on_closed(epoch);
        return;
    }

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        tracing::warn!(error = %e, "ws: send failed");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let close = CloseFrame { code: CloseCode::Normal, reason: "client disconnecting".into() };
                    let _ = sink.send(Message::Close(Some(close))).await;
                    let _ = sink.close().await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => inner.handle_text(text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "ws: server closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "ws: recv error");
                    break;
                }
                None => break,
            },
        }
    }

    inner.on_closed(epoch);
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
