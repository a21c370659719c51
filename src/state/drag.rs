//! Drag-and-drop reconciliation.
//!
//! DESIGN
//! ======
//! A drop onto another column moves the item on the shared board right away,
//! then asks the store to make the same change. The board is never rolled
//! back by hand: if the store rejects the move or the call fails, the
//! reconciler reloads the whole snapshot and lets the rebuild put the item
//! wherever the server says it is.
//!
//! The remote call runs in its own task, so the caller can keep handling
//! gestures while it is outstanding. The returned [`PendingMove`] reports how
//! the move settled for callers that want to wait.
//!
//! Only one drag session is tracked at a time. Keeping gestures from
//! overlapping is the input layer's job; a second `begin_drag` replaces the
//! first session.

use std::fmt;

use tokio::task::JoinHandle;

use super::board::SharedBoard;
use super::refresh::Refresher;
use crate::model::{ItemId, Status};
use crate::remote::IssueStore;

/// The item currently being dragged.
///
/// `origin` and `hovering` are for rendering the gesture. A drop looks the
/// item up on the board again, so a snapshot that moved it mid-drag wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragSession {
    pub item_id: ItemId,
    /// Column holding the item when the drag started.
    pub origin: Option<Status>,
    /// Last column reported by `drag_over`.
    pub hovering: Option<Status>,
}

/// Why a drop ended without touching the board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    /// Released outside any column.
    NoTarget,
    /// The target is not one of the board's columns.
    UnknownTarget(String),
    /// Released on the column it came from.
    SameColumn,
    /// The dragged item is no longer on the board.
    OriginMissing,
    /// The gesture ended for a different item than the one being dragged.
    ItemMismatch,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTarget => f.write_str("dropped outside any column"),
            Self::UnknownTarget(target) => write!(f, "unknown drop target {target}"),
            Self::SameColumn => f.write_str("dropped on its own column"),
            Self::OriginMissing => f.write_str("item is not on the board"),
            Self::ItemMismatch => f.write_str("drag ended for a different item"),
        }
    }
}

/// Final state of a move after the remote call completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The store accepted the move; the optimistic board stands.
    Confirmed,
    /// The store refused or failed, and the board was reloaded from a fresh
    /// snapshot.
    Reconciled { reason: String },
    /// The store refused or failed, and reloading failed as well. The board
    /// still shows the optimistic move.
    Unreconciled { reason: String, error: String },
    /// The background task was cancelled or panicked.
    Abandoned,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => f.write_str("confirmed"),
            Self::Reconciled { reason } => write!(f, "rejected ({reason}), board reloaded"),
            Self::Unreconciled { reason, error } => {
                write!(f, "rejected ({reason}), reload failed: {error}")
            }
            Self::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// A move applied to the board whose remote call may still be in flight.
#[derive(Debug)]
pub struct PendingMove {
    pub item_id: ItemId,
    pub from: Status,
    pub to: Status,
    handle: JoinHandle<Settlement>,
}

impl PendingMove {
    /// Wait for the remote call, and any reload it caused, to finish.
    pub async fn settled(self) -> Settlement {
        match self.handle.await {
            Ok(settlement) => settlement,
            Err(e) => {
                tracing::warn!(item = %self.item_id, error = %e, "move task did not finish");
                Settlement::Abandoned
            }
        }
    }
}

#[derive(Debug)]
pub enum DropOutcome {
    /// No drag was in progress.
    NoSession,
    Discarded(DiscardReason),
    Moved(PendingMove),
}

pub struct DragReconciler<S> {
    refresher: Refresher<S>,
    session: Option<DragSession>,
}

impl<S: IssueStore> DragReconciler<S> {
    pub fn new(refresher: Refresher<S>) -> Self {
        Self { refresher, session: None }
    }

    #[must_use]
    pub fn board(&self) -> &SharedBoard {
        self.refresher.board()
    }

    #[must_use]
    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Open a drag session for `item_id`. The board is not touched.
    pub fn begin_drag(&mut self, item_id: impl Into<ItemId>) {
        let item_id = item_id.into();
        let origin = self.board().read(|board| board.locate(&item_id).map(|(status, _)| status));
        if let Some(previous) = self.session.take() {
            tracing::debug!(item = %previous.item_id, "drag session replaced");
        }
        tracing::debug!(item = %item_id, ?origin, "drag started");
        self.session = Some(DragSession { item_id, origin, hovering: None });
    }

    /// Record the column under the pointer. Ids that are not an exact column
    /// id clear it.
    pub fn drag_over(&mut self, column_id: &str) {
        if let Some(session) = self.session.as_mut() {
            session.hovering = Status::from_column_id(column_id);
        }
    }

    /// Abandon the current session without any effect.
    pub fn cancel(&mut self) -> Option<DragSession> {
        self.session.take()
    }

    /// Gesture-layer entry point: the drag of `item_id` ended over
    /// `over`, or outside every column when `None`.
    pub fn drag_end(&mut self, item_id: &ItemId, over: Option<&str>) -> DropOutcome {
        let Some(session) = self.session.as_ref() else {
            return DropOutcome::NoSession;
        };
        if &session.item_id != item_id {
            self.session = None;
            return discard(item_id, DiscardReason::ItemMismatch);
        }
        match over {
            Some(column_id) => self.drop_on(column_id),
            None => {
                self.session = None;
                discard(item_id, DiscardReason::NoTarget)
            }
        }
    }

    /// Drop the dragged item on `column_id`, closing the session.
    ///
    /// A drop on another column moves the item on the board before this
    /// returns and starts the remote update in the background.
    pub fn drop_on(&mut self, column_id: &str) -> DropOutcome {
        let Some(session) = self.session.take() else {
            return DropOutcome::NoSession;
        };
        let id = session.item_id;

        let Some(to) = Status::from_column_id(column_id) else {
            return discard(&id, DiscardReason::UnknownTarget(column_id.to_owned()));
        };

        let moved = self.board().update(|board| match board.locate(&id) {
            None => (false, Err(DiscardReason::OriginMissing)),
            Some((from, _)) if from == to => (false, Err(DiscardReason::SameColumn)),
            Some(_) => {
                let from = board.move_to(&id, to).ok_or(DiscardReason::OriginMissing);
                (from.is_ok(), from)
            }
        });
        let from = match moved {
            Ok(from) => from,
            Err(reason) => return discard(&id, reason),
        };

        tracing::info!(item = %id, %from, %to, "item moved, updating store");
        let handle = tokio::spawn(push_move(self.refresher.clone(), id.clone(), to));
        DropOutcome::Moved(PendingMove { item_id: id, from, to, handle })
    }

    /// Local-only reorder inside one column. Nothing is sent to the store.
    pub fn reorder(&self, status: Status, from: usize, to: usize) -> bool {
        self.board().update(|board| {
            let moved = board.reorder(status, from, to) && from != to;
            (moved, moved)
        })
    }
}

fn discard(id: &ItemId, reason: DiscardReason) -> DropOutcome {
    tracing::debug!(item = %id, %reason, "drop discarded");
    DropOutcome::Discarded(reason)
}

async fn push_move<S: IssueStore>(refresher: Refresher<S>, id: ItemId, to: Status) -> Settlement {
    let reason = match refresher.store().update_status(&id, to).await {
        Ok(update) if update.success => {
            tracing::debug!(item = %id, %to, "store confirmed move");
            return Settlement::Confirmed;
        }
        Ok(update) => update.message.unwrap_or_else(|| "update rejected".to_owned()),
        Err(e) => e.to_string(),
    };

    tracing::warn!(item = %id, %to, %reason, "move not accepted, reloading board");
    match refresher.refresh().await {
        Ok(_) => Settlement::Reconciled { reason },
        Err(e) => {
            tracing::warn!(item = %id, error = %e, "reload after failed move also failed");
            Settlement::Unreconciled { reason, error: e.to_string() }
        }
    }
}

#[cfg(test)]
#[path = "drag_test.rs"]
mod tests;
