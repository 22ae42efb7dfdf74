//! `PairlinkServer` builder and server loop.
//!
//! This is the entry point for running a Pairlink relay. It ties together
//! all the layers: transport → protocol → pairing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pairlink_pairing::{Matchmaker, PairingConfig};
use pairlink_protocol::{Codec, JsonCodec};
use pairlink_transport::{Transport, TransportError, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::handler::handle_connection;
use crate::{PairlinkError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The single
/// `Mutex` around the matchmaker is the critical section every pairing
/// operation runs in.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) matchmaker: Mutex<Matchmaker>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Pairlink server.
///
/// # Example
///
/// ```rust,no_run
/// use pairlink::prelude::*;
///
/// # async fn start() -> Result<(), PairlinkError> {
/// let server = PairlinkServerBuilder::new()
///     .bind("0.0.0.0:7070")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PairlinkServerBuilder {
    config: ServerConfig,
}

impl PairlinkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Creates a builder starting from an existing configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the request path WebSocket upgrades are accepted on.
    pub fn path(mut self, path: &str) -> Self {
        self.config.path = path.to_string();
        self
    }

    /// Sets how long a client gets to finish the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the keep-alive ping period. `None` disables pings.
    pub fn ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Sets how often stale waiters are swept.
    pub fn idle_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.idle_sweep_interval = interval;
        self
    }

    /// Sets the matchmaking configuration.
    pub fn pairing_config(mut self, config: PairingConfig) -> Self {
        self.config.pairing = config;
        self
    }

    /// Binds the listener and builds a server speaking JSON.
    pub async fn build(self) -> Result<PairlinkServer<JsonCodec>, PairlinkError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener and builds a server using `codec` on the wire.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<PairlinkServer<C>, PairlinkError> {
        let transport = WebSocketTransport::bind_with_timeout(
            &self.config.bind_addr,
            &self.config.path,
            self.config.handshake_timeout,
        )
        .await?;

        let state = Arc::new(ServerState {
            matchmaker: Mutex::new(Matchmaker::new(self.config.pairing.clone())),
            codec,
            config: self.config,
        });

        Ok(PairlinkServer { transport, state })
    }
}

impl Default for PairlinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pairlink server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PairlinkServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PairlinkServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PairlinkServerBuilder {
        PairlinkServerBuilder::new()
    }
}

impl<C: Codec> PairlinkServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each
    /// one. When a waiting timeout is configured, a sweeper task expires
    /// stale waiters alongside. Runs until the process is terminated.
    pub async fn run(self) -> Result<(), PairlinkError> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run()`](Self::run), but stops accepting once `shutdown`
    /// resolves. Connections already being handled keep running.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), PairlinkError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(path = %self.transport.path(), "Pairlink server running");

        let _sweeper = self
            .state
            .config
            .pairing
            .waiting_timeout
            .map(|_| AbortOnDrop(tokio::spawn(sweep_idle(Arc::clone(&self.state)))));

        tokio::pin!(shutdown);
        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => None,
                accepted = self.transport.accept() => Some(accepted),
            };
            let Some(accepted) = accepted else {
                self.transport.shutdown().await?;
                tracing::info!("Pairlink server stopped accepting");
                return Ok(());
            };

            match accepted {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Rejected(path)) => {
                    tracing::debug!(%path, "upgrade rejected");
                }
                Err(TransportError::HandshakeTimedOut(peer)) => {
                    tracing::debug!(%peer, "dropped client that never upgraded");
                }
                Err(TransportError::Shutdown) => return Ok(()),
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Stops a background task when the server future is dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Periodically drops waiters that sat unmatched past the timeout.
async fn sweep_idle<C: Codec>(state: Arc<ServerState<C>>) {
    let mut interval = tokio::time::interval(state.config.idle_sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let expired = state
            .matchmaker
            .lock()
            .await
            .expire_idle(std::time::Instant::now());
        for conn in &expired {
            tracing::info!(%conn, "waiter timed out");
        }
    }
}
