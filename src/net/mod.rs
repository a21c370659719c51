//! Realtime transport: socket lifecycle, reconnect policy and the connector seam.

pub mod backoff;
pub mod connection;
pub mod connector;

pub use backoff::{Backoff, ReconnectPolicy};
pub use connection::{ConnectionManager, ConnectionState};
pub use connector::{Connector, Socket, WsConnector};
