//! Per-connection handler: registration, message routing, and keep-alive.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register an outbound channel with the matchmaker
//!   2. Loop: decode inbound frames and dispatch them, write whatever the
//!      matchmaker queued for this client, ping on a timer
//!   3. On close or error, the guard aborts the client's pairing

use std::sync::Arc;
use std::time::Duration;

use pairlink_protocol::{Codec, Message};
use pairlink_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::PairlinkError;
use crate::server::ServerState;

/// Drop guard that runs the close hook when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        // No runtime means the process is going down with the pool.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            state.matchmaker.lock().await.disconnect(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PairlinkError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.matchmaker.lock().await.connect(conn_id, tx)?;
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let mut ping = state.config.ping_interval.map(keepalive);

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };

                let message: Message = match state.codec.decode(&data) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode message");
                        continue;
                    }
                };

                let result = state.matchmaker.lock().await.dispatch(conn_id, message);
                if let Err(e) = result {
                    tracing::error!(%conn_id, error = %e, "dispatch failed");
                }
            }

            Some(message) = rx.recv() => {
                let bytes = state.codec.encode(&message)?;
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%conn_id, %message, error = %e, "send failed");
                    break;
                }
            }

            () = next_tick(&mut ping) => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%conn_id, error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    // _guard drops here → pairing aborted, partner told.
    Ok(())
}

fn keepalive(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Waits for the next keep-alive tick, or forever when pings are off.
async fn next_tick(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
