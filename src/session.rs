//! Sync session: one explicitly owned bundle of socket, dispatcher and board.
//!
//! DESIGN
//! ======
//! `SyncSession::start` wires the pieces together:
//! - every `issue_*` push event schedules a snapshot refresh
//! - each time the socket reaches OPEN the board is refreshed, which covers
//!   whatever was missed while disconnected
//! - an optional heartbeat pings the server while the socket is open
//!
//! Push payloads are never merged into the board. They are only a hint that
//! the snapshot is stale.
//!
//! LIFECYCLE
//! =========
//! `start` connects and kicks off the first snapshot fetch. `shutdown` (also
//! run on drop) removes the event subscriptions, stops the background tasks
//! and closes the socket. Nothing here is process-global: two sessions are
//! two independent sockets and boards.

use std::sync::Arc;
use std::time::Duration;

use frames::FrameType;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SyncConfig;
use crate::dispatch::{EventDispatcher, Subscription};
use crate::net::{ConnectionManager, ConnectionState, Connector, WsConnector};
use crate::remote::{IssueStore, RemoteError};
use crate::state::{DragReconciler, IssueFilter, Refresher, SharedBoard};

pub struct SyncSession<S: IssueStore> {
    config: SyncConfig,
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
    refresher: Refresher<S>,
    drag: DragReconciler<S>,
    subscriptions: Vec<Subscription>,
    tasks: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl<S: IssueStore> SyncSession<S> {
    /// Start a session over a real websocket. Must be called from within a
    /// tokio runtime.
    pub fn start(config: SyncConfig, store: Arc<S>) -> Self {
        Self::start_with_connector(config, store, Arc::new(WsConnector))
    }

    pub fn start_with_connector(config: SyncConfig, store: Arc<S>, connector: Arc<dyn Connector>) -> Self {
        let dispatcher = EventDispatcher::new();
        let refresher = Refresher::new(store, SharedBoard::default());

        let subscriptions = FrameType::ALL
            .into_iter()
            .filter(|kind| kind.is_issue_event())
            .map(|kind| {
                let refresher = refresher.clone();
                dispatcher.subscribe(kind.as_str(), move |_payload| {
                    refresher.spawn_refresh();
                    Ok(())
                })
            })
            .collect();

        let connection = ConnectionManager::with_connector(
            config.ws_url.clone(),
            config.reconnect,
            dispatcher.clone(),
            connector,
        );

        let mut tasks = vec![tokio::spawn(refresh_on_open(connection.watch_state(), refresher.clone()))];
        if let Some(period) = config.heartbeat {
            tasks.push(tokio::spawn(heartbeat(connection.clone(), period)));
        }

        tracing::info!(
            ws_url = %config.ws_url,
            graphql_url = %config.graphql_url,
            heartbeat_secs = config.heartbeat.map(|d| d.as_secs()),
            "sync session starting"
        );
        connection.connect();
        tasks.push(refresher.spawn_refresh());

        Self {
            drag: DragReconciler::new(refresher.clone()),
            config,
            dispatcher,
            connection,
            refresher,
            subscriptions,
            tasks,
            stopped: false,
        }
    }

    #[must_use]
    pub fn board(&self) -> &SharedBoard {
        self.refresher.board()
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn drag(&mut self) -> &mut DragReconciler<S> {
        &mut self.drag
    }

    /// Fetch a snapshot now and rebuild the board from it.
    ///
    /// # Errors
    ///
    /// Returns the store error when the snapshot cannot be fetched.
    pub async fn refresh(&self) -> Result<bool, RemoteError> {
        self.refresher.refresh().await
    }

    /// Replace the board filter and reload so it takes effect.
    ///
    /// # Errors
    ///
    /// Returns the store error when the reload fails. The new filter stays
    /// in place and applies to the next successful snapshot.
    pub async fn set_filter(&self, filter: IssueFilter) -> Result<bool, RemoteError> {
        self.board().update(|board| {
            board.set_filter(filter);
            (false, ())
        });
        self.refresher.refresh().await
    }

    /// Unsubscribe, stop background tasks and close the socket. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connection.disconnect();
        tracing::info!(ws_url = %self.config.ws_url, "sync session stopped");
    }
}

impl<S: IssueStore> Drop for SyncSession<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn refresh_on_open<S: IssueStore>(mut state: watch::Receiver<ConnectionState>, refresher: Refresher<S>) {
    let mut was_open = *state.borrow_and_update() == ConnectionState::Open;
    while state.changed().await.is_ok() {
        let open = *state.borrow_and_update() == ConnectionState::Open;
        if open && !was_open {
            tracing::info!("connection open, refreshing board");
            refresher.spawn_refresh();
        }
        was_open = open;
    }
}

async fn heartbeat(connection: ConnectionManager, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if connection.is_open() {
            connection.ping();
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
