//! Board model: issues partitioned into status columns.
//!
//! DESIGN
//! ======
//! The board is always derived from a full snapshot. `rebuild` replaces all
//! three columns; there is no incremental merge path. Optimistic moves made
//! by the drag reconciler live in the columns until the next rebuild.
//!
//! Snapshots carry a sequence ticket. A snapshot whose ticket is not newer
//! than the last applied one is ignored, so a slow fetch that finishes late
//! cannot overwrite a fresher one.

use std::sync::Arc;

use tokio::sync::watch;

use super::filter::IssueFilter;
use crate::model::{Item, ItemId, Status};

/// Issues believed to hold one status, in display order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub status: Status,
    pub items: Vec<Item>,
}

impl Column {
    fn empty(status: Status) -> Self {
        Self { status, items: Vec::new() }
    }

    /// Column id handed to the presentation layer, e.g. `"IN_PROGRESS"`.
    #[must_use]
    pub fn id(&self) -> &'static str {
        self.status.as_str()
    }

    #[must_use]
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    columns: [Column; 3],
    filter: IssueFilter,
    applied_seq: u64,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            columns: Status::DISPLAY_ORDER.map(Column::empty),
            filter: IssueFilter::default(),
            applied_seq: 0,
        }
    }
}

impl Board {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(items: &[Item]) -> Self {
        let mut board = Self::new();
        board.rebuild(items);
        board
    }

    /// Replace every column with the contents of `items`, keeping the
    /// snapshot's relative order inside each column.
    pub fn rebuild(&mut self, items: &[Item]) {
        let mut columns = Status::DISPLAY_ORDER.map(Column::empty);
        for item in items.iter().filter(|item| self.filter.matches(item)) {
            columns[item.status.column_index()].items.push(item.clone());
        }
        self.columns = columns;
    }

    /// Rebuild from a snapshot taken under ticket `seq`. Returns `false`
    /// without touching the board when a newer snapshot was already applied.
    pub fn apply_snapshot(&mut self, seq: u64, items: &[Item]) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.rebuild(items);
        true
    }

    #[must_use]
    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    /// Columns in fixed display order: OPEN, `IN_PROGRESS`, CLOSED.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, status: Status) -> &Column {
        &self.columns[status.column_index()]
    }

    #[must_use]
    pub fn filter(&self) -> &IssueFilter {
        &self.filter
    }

    /// Set the filter used by later rebuilds. Current columns are unchanged.
    pub fn set_filter(&mut self, filter: IssueFilter) {
        self.filter = filter;
    }

    /// Column and index currently holding `id`.
    #[must_use]
    pub fn locate(&self, id: &ItemId) -> Option<(Status, usize)> {
        self.columns
            .iter()
            .find_map(|col| col.position(id).map(|index| (col.status, index)))
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.locate(id).map(|(status, index)| &self.column(status).items[index])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.items.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `id` to the end of column `to`, rewriting its status. Returns the
    /// column it came from, or `None` if the item is not on the board.
    pub fn move_to(&mut self, id: &ItemId, to: Status) -> Option<Status> {
        let (from, index) = self.locate(id)?;
        let mut item = self.columns[from.column_index()].items.remove(index);
        item.status = to;
        self.columns[to.column_index()].items.push(item);
        Some(from)
    }

    /// Local-only permutation inside one column.
    pub fn reorder(&mut self, status: Status, from: usize, to: usize) -> bool {
        let items = &mut self.columns[status.column_index()].items;
        if from >= items.len() || to >= items.len() {
            return false;
        }
        let item = items.remove(from);
        items.insert(to, item);
        true
    }
}

/// Board shared between the session, the reconciler and any renderer.
///
/// Backed by a watch channel: every mutation that changes something wakes
/// receivers obtained from [`SharedBoard::subscribe`].
#[derive(Clone, Debug)]
pub struct SharedBoard {
    tx: Arc<watch::Sender<Board>>,
}

impl Default for SharedBoard {
    fn default() -> Self {
        Self::new(Board::new())
    }
}

impl SharedBoard {
    #[must_use]
    pub fn new(board: Board) -> Self {
        let (tx, _) = watch::channel(board);
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current board.
    #[must_use]
    pub fn snapshot(&self) -> Board {
        self.tx.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Board) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Mutate the board. `f` returns whether it changed anything; receivers
    /// are only notified when it did.
    pub fn update<R>(&self, f: impl FnOnce(&mut Board) -> (bool, R)) -> R {
        let mut out = None;
        self.tx.send_if_modified(|board| {
            let (changed, result) = f(board);
            out = Some(result);
            changed
        });
        match out {
            Some(result) => result,
            None => unreachable!("send_if_modified always runs its closure"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Board> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
