//! Socket transport.
//!
//! The connection manager talks to the network only through the
//! [`Connector`], [`SocketWriter`] and [`SocketReader`] traits. The
//! production implementation is [`WsConnector`], a thin wrapper around
//! `tokio-tungstenite` that carries frames as binary WebSocket messages.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use crate::error::{ClientError, ClientResult};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Both halves of an open socket.
pub type Connection = (Box<dyn SocketWriter>, Box<dyn SocketReader>);

/// Opens sockets to broadcast hosts.
pub trait Connector: Send + Sync {
    /// Opens a socket to `url`.
    fn connect(&self, url: String) -> BoxFuture<'_, ClientResult<Connection>>;
}

/// Write half of a socket.
pub trait SocketWriter: Send {
    /// Sends one encoded frame.
    fn send(&mut self, frame: Vec<u8>) -> BoxFuture<'_, ClientResult<()>>;

    /// Sends a close frame and shuts the write half.
    fn close(&mut self) -> BoxFuture<'_, ClientResult<()>>;
}

/// Read half of a socket.
pub trait SocketReader: Send {
    /// Receives the next binary read, or `None` once the socket is closed.
    fn next(&mut self) -> BoxFuture<'_, Option<ClientResult<Vec<u8>>>>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: String) -> BoxFuture<'_, ClientResult<Connection>> {
        Box::pin(async move {
            let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ClientError::Connection(format!("connect {} failed: {}", url, e)))?;
            debug!(url = %url, status = %response.status(), "websocket open");

            let (sink, stream) = stream.split();
            let writer: Box<dyn SocketWriter> = Box::new(WsWriter { sink });
            let reader: Box<dyn SocketReader> = Box::new(WsReader { stream });
            Ok((writer, reader))
        })
    }
}

struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl SocketWriter for WsWriter {
    fn send(&mut self, frame: Vec<u8>) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            self.sink
                .send(Message::Binary(frame.into()))
                .await
                .map_err(|e| ClientError::Connection(format!("send failed: {}", e)))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            self.sink
                .send(Message::Close(None))
                .await
                .map_err(|e| ClientError::Connection(format!("close failed: {}", e)))?;
            self.sink
                .close()
                .await
                .map_err(|e| ClientError::Connection(format!("close failed: {}", e)))
        })
    }
}

struct WsReader {
    stream: SplitStream<WsStream>,
}

impl SocketReader for WsReader {
    fn next(&mut self) -> BoxFuture<'_, Option<ClientResult<Vec<u8>>>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Binary(data))) => return Some(Ok(Vec::from(data))),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server sent close");
                        return None;
                    }
                    // Pings are answered by tungstenite itself.
                    Some(Ok(other)) => {
                        trace!(len = other.len(), "skipping non-binary message");
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some(Err(ClientError::Connection(format!("read failed: {}", e))));
                    }
                    None => return None,
                }
            }
        })
    }
}
