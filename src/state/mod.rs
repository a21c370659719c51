//! Client-side board state.
//!
//! DESIGN
//! ======
//! The board is a projection of the server's issue list into status columns.
//! It is rebuilt wholesale from snapshots (`refresh`) and mutated locally
//! only by drag-and-drop (`drag`). Both paths share one [`SharedBoard`].

pub mod board;
pub mod drag;
pub mod filter;
pub mod refresh;

pub use board::{Board, Column, SharedBoard};
pub use drag::{DiscardReason, DragReconciler, DragSession, DropOutcome, PendingMove, Settlement};
pub use filter::{AssigneeFilter, IssueFilter};
pub use refresh::Refresher;
