//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! TCP accepts run on a background task and every upgrade handshake on its
//! own task, so a client that connects and never finishes the handshake
//! only costs itself. Finished upgrades queue up for [`Transport::accept`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// The request path clients upgrade on unless configured otherwise.
pub const DEFAULT_PATH: &str = "/api/matchmaking";

/// How long a client gets to complete the upgrade unless configured
/// otherwise.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgrades (or upgrade failures) waiting to be picked up by `accept`.
const ACCEPT_BACKLOG: usize = 64;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;
type Accepted = Result<WebSocketConnection, TransportError>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Only upgrade requests on `path` are accepted; everything else gets a
/// plain 404 and never reaches the pairing engine.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    path: Arc<str>,
    incoming: mpsc::Receiver<Accepted>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address, serving
    /// upgrades on `path` with the default handshake timeout.
    pub async fn bind(addr: &str, path: &str) -> Result<Self, TransportError> {
        Self::bind_with_timeout(addr, path, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Like [`bind`](Self::bind), dropping clients that haven't finished
    /// the upgrade within `handshake_timeout`.
    pub async fn bind_with_timeout(
        addr: &str,
        path: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, path, "WebSocket transport listening");

        let path: Arc<str> = Arc::from(path);
        let (tx, incoming) = mpsc::channel(ACCEPT_BACKLOG);
        let acceptor = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&path),
            handshake_timeout,
            tx,
        ));

        Ok(Self {
            local_addr,
            path,
            incoming,
            acceptor,
        })
    }

    /// Returns the address the listener is bound to.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    /// Returns the request path upgrades are accepted on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Returns the next upgraded connection.
    ///
    /// Cancel-safe. After [`shutdown`](Transport::shutdown), upgrades
    /// already in flight are still handed out, then this returns
    /// [`TransportError::Shutdown`].
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.unwrap_or(Err(TransportError::Shutdown))
    }

    /// Stops listening. Connections already handed out are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.acceptor.abort();
        tracing::info!(local_addr = %self.local_addr, "WebSocket transport stopped");
        Ok(())
    }
}

/// Accepts TCP connections and hands each one to its own upgrade task.
async fn accept_loop(
    listener: TcpListener,
    path: Arc<str>,
    handshake_timeout: Duration,
    tx: mpsc::Sender<Accepted>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                if tx.send(Err(TransportError::AcceptFailed(e))).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let path = Arc::clone(&path);
        let tx = tx.clone();
        tokio::spawn(async move {
            let upgraded =
                match tokio::time::timeout(handshake_timeout, upgrade(stream, addr, &path)).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::debug!(%addr, "upgrade handshake timed out");
                        Err(TransportError::HandshakeTimedOut(addr))
                    }
                };
            // The receiver is gone once the transport is dropped.
            let _ = tx.send(upgraded).await;
        });
    }
}

/// Runs the WebSocket handshake, answering 404 for any path but `expected`.
async fn upgrade(stream: TcpStream, addr: SocketAddr, expected: &str) -> Accepted {
    let mut requested = None;
    let check_path = |req: &Request, resp: Response| {
        let path = req.uri().path();
        if path == expected {
            Ok(resp)
        } else {
            requested = Some(path.to_string());
            let mut reject = ErrorResponse::new(Some("not found".into()));
            *reject.status_mut() = StatusCode::NOT_FOUND;
            Err(reject)
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async(stream, check_path).await;
    let ws = match handshake {
        Ok(ws) => ws,
        Err(tungstenite::Error::Http(_)) => {
            let path = requested.unwrap_or_default();
            tracing::debug!(%addr, %path, "rejected upgrade on unknown path");
            return Err(TransportError::Rejected(path));
        }
        Err(e) => {
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            )));
        }
    };

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

/// A single WebSocket connection.
///
/// The socket is split so that a task parked in [`recv`](Connection::recv)
/// doesn't hold up writers.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends `data` as a Text frame when it is valid UTF-8, Binary otherwise.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.write(msg).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.write(Message::Ping(Vec::new().into())).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.write(Message::Close(None)).await
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
