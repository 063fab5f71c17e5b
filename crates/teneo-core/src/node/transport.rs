//! Transport seam between the connection manager and the network.
//!
//! A [`Dialer`] turns a node URL into a pair of text-frame halves. The
//! production dialer speaks WebSocket through `tokio-tungstenite`; tests
//! plug in channel-backed dialers.

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use super::frame::OutboundFrame;
use crate::error::TransportError;

/// Outbound half: accepts encoded text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half: yields text frames until the peer closes or errors.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// Secure WebSocket dialer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self, url: &Url) -> Result<(FrameSink, FrameStream), TransportError> {
        // TODO: bound the handshake with a timeout once a dial retry policy exists.
        let (socket, _response) = connect_async(url.as_str()).await?;
        let (write, read) = socket.split();

        let sink = write
            .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::Text(text))))
            .sink_map_err(socket_error);

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                // Control frames are answered by tungstenite itself.
                Ok(_) => None,
                Err(e) => Some(Err(socket_error(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// A socket that is already closed reads as [`TransportError::Closed`];
/// everything else keeps the tungstenite error.
fn socket_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        other => TransportError::WebSocket(other),
    }
}

/// The single outbound connection, if any.
#[derive(Default)]
pub(crate) struct Link {
    pub(crate) sink: Option<FrameSink>,
    pub(crate) identity: Option<String>,
}

impl Link {
    pub(crate) fn is_connected(&self) -> bool {
        self.sink.is_some()
    }
}

/// Shared handle to the connection. Every write and every state change
/// of the link goes through its mutex.
#[derive(Clone, Default)]
pub struct LinkHandle(pub(crate) Arc<Mutex<Link>>);

impl LinkHandle {
    pub async fn is_connected(&self) -> bool {
        self.0.lock().await.is_connected()
    }

    pub async fn identity(&self) -> Option<String> {
        self.0.lock().await.identity.clone()
    }

    /// Encode and write one frame.
    pub async fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let text = frame.encode()?;
        let mut link = self.0.lock().await;
        let sink = link.sink.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(text).await
    }
}
