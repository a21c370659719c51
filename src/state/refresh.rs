//! Snapshot refresh path.
//!
//! DESIGN
//! ======
//! Every refresh takes a ticket from a shared counter before it starts
//! fetching. The board only accepts a snapshot whose ticket is newer than the
//! one it last applied, so overlapping refreshes settle on the freshest
//! request even when responses come back out of order.
//!
//! ERROR HANDLING
//! ==============
//! `refresh` returns the `RemoteError` to callers that care (the drag
//! reconciler). `spawn_refresh` is fire-and-forget and only logs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;

use super::board::SharedBoard;
use crate::remote::{IssueStore, RemoteError};

pub struct Refresher<S> {
    store: Arc<S>,
    board: SharedBoard,
    issued: Arc<AtomicU64>,
}

impl<S> Clone for Refresher<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), board: self.board.clone(), issued: Arc::clone(&self.issued) }
    }
}

impl<S: IssueStore> Refresher<S> {
    pub fn new(store: Arc<S>, board: SharedBoard) -> Self {
        Self { store, board, issued: Arc::new(AtomicU64::new(0)) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    /// Fetch a full snapshot and rebuild the board from it.
    ///
    /// Returns `Ok(false)` when the fetch succeeded but a newer snapshot had
    /// already been applied.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the snapshot cannot be fetched. The
    /// board is left untouched in that case.
    pub async fn refresh(&self) -> Result<bool, RemoteError> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let items = self.store.fetch_issues().await?;
        let applied = self.board.update(|board| {
            let applied = board.apply_snapshot(seq, &items);
            (applied, applied)
        });
        if applied {
            tracing::debug!(seq, items = items.len(), "board rebuilt from snapshot");
        } else {
            tracing::debug!(seq, "stale snapshot ignored");
        }
        Ok(applied)
    }

    /// Run [`Refresher::refresh`] in the background, logging failures.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.refresh().await {
                tracing::warn!(error = %e, "snapshot refresh failed");
            }
        })
    }
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
