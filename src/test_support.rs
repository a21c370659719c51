//! Shared fakes for unit tests: an in-memory issue store and an in-memory
//! socket connector.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::model::{Item, ItemId, Priority, Status};
use crate::net::{Connector, Socket};
use crate::remote::{IssueStore, RemoteError, StatusUpdate};

pub fn item(id: i64, status: Status) -> Item {
    Item {
        id: ItemId::from(id),
        title: format!("Issue {id}"),
        description: String::new(),
        enhanced_description: None,
        priority: Priority::Medium,
        status,
        assignee_id: None,
        reporter_id: 1,
        created_at: "2024-01-01T00:00:00".to_owned(),
        updated_at: "2024-01-01T00:00:00".to_owned(),
        tags: Vec::new(),
    }
}

// =============================================================================
// ISSUE STORE
// =============================================================================

#[derive(Clone, Debug)]
pub enum MockUpdate {
    Accept,
    Reject(String),
    Fail,
}

pub struct MockStore {
    snapshot: Mutex<Vec<Item>>,
    update: Mutex<MockUpdate>,
    fail_fetch: AtomicBool,
    update_gate: Mutex<Option<Arc<Notify>>>,
    fetches: AtomicUsize,
    updates: Mutex<Vec<(ItemId, Status)>>,
}

impl MockStore {
    pub fn new(snapshot: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            update: Mutex::new(MockUpdate::Accept),
            fail_fetch: AtomicBool::new(false),
            update_gate: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn set_snapshot(&self, snapshot: Vec<Item>) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn set_update(&self, update: MockUpdate) {
        *self.update.lock().unwrap_or_else(PoisonError::into_inner) = update;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make `update_status` wait until the returned notify is signalled.
    pub fn gate_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&gate));
        gate
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<(ItemId, Status)> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait::async_trait]
impl IssueStore for MockStore {
    async fn fetch_issues(&self) -> Result<Vec<Item>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Status { status: 503, body: "unavailable".to_owned() });
        }
        Ok(self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn update_status(&self, id: &ItemId, status: Status) -> Result<StatusUpdate, RemoteError> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner).push((id.clone(), status));
        let gate = self.update_gate.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let update = self.update.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match update {
            MockUpdate::Accept => Ok(StatusUpdate::accepted(None)),
            MockUpdate::Reject(reason) => Ok(StatusUpdate::rejected(reason)),
            MockUpdate::Fail => Err(RemoteError::GraphQl("connection reset".to_owned())),
        }
    }
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Server side of an accepted in-memory socket. Dropping it closes the
/// socket from the server's end.
pub struct ServerEnd {
    to_client: fmpsc::UnboundedSender<Result<Message, WsError>>,
    from_client: fmpsc::UnboundedReceiver<Message>,
}

impl ServerEnd {
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.unbounded_send(Ok(Message::text(text)));
    }

    /// Next message written by the client, or `None` once its sink closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.from_client.next().await
    }
}

/// Connector that accepts or refuses every attempt, switchable mid-test. A
/// stalling connector never finishes the handshake.
pub struct FakeConnector {
    accept: AtomicBool,
    stall: AtomicBool,
    attempts: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl FakeConnector {
    pub fn accepting() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        Self::build(true)
    }

    pub fn refusing() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        Self::build(false)
    }

    fn build(accept: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accept: AtomicBool::new(accept),
            stall: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            accepted,
        });
        (connector, rx)
    }

    pub fn set_accepting(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn set_stalling(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<Socket, WsError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if !self.accept.load(Ordering::SeqCst) {
            return Err(WsError::ConnectionClosed);
        }

        let (client_tx, from_client) = fmpsc::unbounded::<Message>();
        let (to_client, client_rx) = fmpsc::unbounded::<Result<Message, WsError>>();
        let _ = self.accepted.send(ServerEnd { to_client, from_client });
        Ok(Socket {
            sink: Box::pin(client_tx.sink_map_err(|_| WsError::ConnectionClosed)),
            stream: Box::pin(client_rx),
        })
    }
}
