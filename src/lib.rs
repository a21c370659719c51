//! # issueboard
//!
//! Client-side realtime sync for an issue-tracking board. Keeps a local
//! board of issues grouped by status in step with the server: push events
//! arrive over a websocket, snapshots and status changes go through GraphQL,
//! and drag-and-drop moves are applied optimistically and reconciled by
//! reloading the snapshot when the server disagrees.
//!
//! The pieces are usable on their own, but most callers want
//! [`session::SyncSession`], which owns one of each.

pub mod config;
pub mod dispatch;
pub mod model;
pub mod net;
pub mod remote;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;
