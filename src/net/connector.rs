//! Socket opening seam.
//!
//! The connection manager never calls `tokio-tungstenite` directly; it asks a
//! [`Connector`] for a split socket. Production uses [`WsConnector`], tests
//! inject an in-memory transport.

use std::pin::Pin;

use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Write and read halves of one open socket.
pub struct Socket {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `url`. Resolves once the handshake is complete.
    async fn connect(&self, url: &str) -> Result<Socket, WsError>;
}

/// Default connector backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Socket, WsError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (sink, stream) = stream.split();
        Ok(Socket { sink: Box::pin(sink), stream: Box::pin(stream) })
    }
}
