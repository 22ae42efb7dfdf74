//! The matchmaking engine.
//!
//! [`Matchmaker`] owns the [`WaitingPool`] and one outbound channel per
//! connected client. The server feeds it three kinds of events per
//! connection:
//!
//! ```text
//! connect ──→ Matchmaker::connect(conn, sender)
//! message ──→ Matchmaker::dispatch(conn, message)
//!               ├─ PAIRING_START ───────────────→ pairing_start
//!               ├─ PAIRING_ABORT ───────────────→ pairing_abort
//!               ├─ PAIRING_DONE ────────────────→ pairing_done
//!               ├─ SDP_OFFER / ANSWER / ICE ────→ forward_message
//!               ├─ PARTNER_FOUND / PARTNER_LEFT → ignored (server-only)
//!               └─ anything else ───────────────→ ignored
//! close ────→ Matchmaker::disconnect(conn)  (abort + unregister)
//! ```
//!
//! Every operation is one atomic step on `&mut self`. Sends push onto an
//! unbounded channel and never wait; a failed send is logged and the pool
//! change that caused it stands.

use std::collections::HashMap;
use std::time::Instant;

use pairlink_protocol::{GO_FIRST, Message, MessageKind};
use pairlink_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::{ExchangeId, PairingConfig, PairingError, WaitingPool};

/// Channel sender for delivering outbound messages to one connection.
///
/// The connection handler owns the receiving end and writes whatever
/// arrives to the socket.
pub type PeerSender = mpsc::UnboundedSender<Message>;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What [`Matchmaker::pairing_start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// No one was waiting; the caller is now the oldest-unmatched candidate.
    Queued(ExchangeId),
    /// The caller joined an existing waiter, who goes first.
    Matched {
        exchange: ExchangeId,
        partner: ConnectionId,
    },
}

/// What [`Matchmaker::pairing_abort`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    /// The connection wasn't in any exchange.
    NotFound,
    /// The exchange was removed. `notified` is the partner told about it.
    Removed {
        exchange: ExchangeId,
        notified: Option<ConnectionId>,
    },
}

/// What [`Matchmaker::pairing_done`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneOutcome {
    /// The connection wasn't in any exchange.
    NotFound,
    /// The signal was recorded; the exchange stays.
    Pending { exchange: ExchangeId, done_count: u8 },
    /// The exchange reached two signals and was removed.
    Completed(ExchangeId),
}

/// What [`Matchmaker::forward_message`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The message was handed to the partner's channel.
    Forwarded { to: ConnectionId },
    /// The sender has no partner; the message was dropped.
    Dropped,
}

/// The result of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Start(StartOutcome),
    Abort(AbortOutcome),
    Done(DoneOutcome),
    Forward(ForwardOutcome),
    /// Unknown or server-only kind; dropped without reply.
    Ignored,
}

// ---------------------------------------------------------------------------
// Matchmaker
// ---------------------------------------------------------------------------

/// Pairs waiting connections and relays negotiation between partners.
///
/// `Matchmaker` is not thread-safe by itself. Wrap it in a single mutex (or
/// give it to a single task) and hold that for the duration of each call;
/// the pairing decisions depend on seeing the whole pool at once.
pub struct Matchmaker {
    pool: WaitingPool,

    /// Outbound channel per connected client.
    peers: HashMap<ConnectionId, PeerSender>,

    config: PairingConfig,
}

impl Matchmaker {
    /// Creates an engine with an empty pool.
    pub fn new(config: PairingConfig) -> Self {
        Self {
            pool: WaitingPool::new(),
            peers: HashMap::new(),
            config,
        }
    }

    /// Registers a freshly connected client and its outbound channel.
    ///
    /// # Errors
    /// [`PairingError::AlreadyConnected`] if `conn` is already registered.
    pub fn connect(
        &mut self,
        conn: ConnectionId,
        sender: PeerSender,
    ) -> Result<(), PairingError> {
        if self.peers.contains_key(&conn) {
            return Err(PairingError::AlreadyConnected(conn));
        }
        self.peers.insert(conn, sender);
        tracing::debug!(%conn, "connection registered");
        Ok(())
    }

    /// Connection-close hook: tears down the client's exchange (telling a
    /// present partner) and forgets its channel.
    pub fn disconnect(&mut self, conn: ConnectionId) -> AbortOutcome {
        let outcome = self.pairing_abort(conn);
        self.peers.remove(&conn);
        tracing::debug!(%conn, "connection unregistered");
        outcome
    }

    /// Routes an inbound message to the operation its kind selects.
    ///
    /// # Errors
    /// Only if `PAIRING_START` trips over broken pool bookkeeping.
    pub fn dispatch(
        &mut self,
        conn: ConnectionId,
        message: Message,
    ) -> Result<Dispatched, PairingError> {
        let outcome = match message.kind() {
            Some(MessageKind::PairingStart) => {
                Dispatched::Start(self.pairing_start(conn)?)
            }
            Some(MessageKind::PairingAbort) => Dispatched::Abort(self.pairing_abort(conn)),
            Some(MessageKind::PairingDone) => Dispatched::Done(self.pairing_done(conn)),
            Some(kind) if kind.is_forwarded() => {
                Dispatched::Forward(self.forward_message(conn, message))
            }
            Some(kind) if !kind.is_client_sent() => {
                tracing::debug!(%conn, %kind, "ignoring server-only kind from client");
                Dispatched::Ignored
            }
            _ => {
                tracing::debug!(%conn, name = %message.name, "ignoring message");
                Dispatched::Ignored
            }
        };
        Ok(outcome)
    }

    /// Puts `conn` in the pool, matching it with the oldest waiter if any.
    ///
    /// Any record already referencing `conn` is dropped first, so a
    /// repeated start re-queues instead of occupying two slots. The partner
    /// of a dropped record is not told.
    ///
    /// On a match the waiter gets `PARTNER_FOUND` with payload `GO_FIRST`
    /// and `conn` gets a bare `PARTNER_FOUND`.
    pub fn pairing_start(&mut self, conn: ConnectionId) -> Result<StartOutcome, PairingError> {
        for stale in self.pool.remove_all_referencing(conn) {
            tracing::debug!(
                %conn,
                exchange = %stale.id(),
                matched = stale.is_matched(),
                "dropped previous exchange on restart"
            );
        }

        let waiting = self.pool.find_unmatched().map(|exchange| exchange.id());
        match waiting {
            Some(id) => {
                let partner = self.pool.match_partner(id, conn)?.first();
                tracing::info!(exchange = %id, first = %partner, second = %conn, "paired");
                self.notify(
                    partner,
                    Message::with_payload(MessageKind::PartnerFound, GO_FIRST),
                );
                self.notify(conn, Message::new(MessageKind::PartnerFound));
                Ok(StartOutcome::Matched {
                    exchange: id,
                    partner,
                })
            }
            None => {
                let id = self.pool.insert(conn, Instant::now())?;
                tracing::info!(exchange = %id, %conn, "waiting for partner");
                Ok(StartOutcome::Queued(id))
            }
        }
    }

    /// Removes `conn`'s exchange and tells the partner, if there is one.
    pub fn pairing_abort(&mut self, conn: ConnectionId) -> AbortOutcome {
        let Some(exchange) = self.pool.find_by_handle(conn) else {
            return AbortOutcome::NotFound;
        };
        let id = exchange.id();
        let partner = exchange.other(conn);

        if let Some(partner) = partner {
            self.notify(partner, Message::new(MessageKind::PartnerLeft));
        }
        self.pool.remove(id);

        tracing::info!(exchange = %id, %conn, partner = ?partner, "exchange aborted");
        AbortOutcome::Removed {
            exchange: id,
            notified: partner,
        }
    }

    /// Records a completion signal from `conn`.
    ///
    /// Once an exchange has two signals it is removed silently; neither
    /// side is sent anything.
    pub fn pairing_done(&mut self, conn: ConnectionId) -> DoneOutcome {
        let marked = self.pool.mark_done(conn, self.config.done_policy);

        let completed = self.pool.remove_completed();
        for exchange in &completed {
            tracing::info!(exchange = %exchange.id(), "exchange completed");
        }

        match marked {
            None => DoneOutcome::NotFound,
            Some((id, _)) if completed.iter().any(|x| x.id() == id) => {
                DoneOutcome::Completed(id)
            }
            Some((id, done_count)) => DoneOutcome::Pending {
                exchange: id,
                done_count,
            },
        }
    }

    /// Relays `message` unchanged to `conn`'s partner.
    ///
    /// Dropped with a warning when `conn` isn't in a matched exchange.
    pub fn forward_message(&mut self, conn: ConnectionId, message: Message) -> ForwardOutcome {
        let partner = self
            .pool
            .find_by_handle(conn)
            .and_then(|exchange| exchange.other(conn));

        match partner {
            Some(partner) => {
                tracing::debug!(from = %conn, to = %partner, %message, "forwarding");
                self.notify(partner, message);
                ForwardOutcome::Forwarded { to: partner }
            }
            None => {
                tracing::warn!(%conn, %message, "received SDP message from unpaired connection");
                ForwardOutcome::Dropped
            }
        }
    }

    /// Drops waiters that have sat unmatched longer than the configured
    /// `waiting_timeout` and sends each one `PARTNER_LEFT`, so the client
    /// knows it is no longer queued and can start again. Returns the
    /// expired connections.
    ///
    /// Does nothing when no timeout is configured.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<ConnectionId> {
        let Some(timeout) = self.config.waiting_timeout else {
            return Vec::new();
        };

        let expired: Vec<ConnectionId> = self
            .pool
            .remove_if(|exchange| {
                !exchange.is_matched()
                    && now.saturating_duration_since(exchange.created_at()) >= timeout
            })
            .into_iter()
            .map(|exchange| {
                tracing::debug!(exchange = %exchange.id(), conn = %exchange.first(), "waiter expired");
                exchange.first()
            })
            .collect();

        for &conn in &expired {
            self.notify(conn, Message::new(MessageKind::PartnerLeft));
        }
        expired
    }

    /// Read-only view of the pool.
    pub fn pool(&self) -> &WaitingPool {
        &self.pool
    }

    /// The active configuration.
    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Returns `true` if `conn` has a registered outbound channel.
    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.peers.contains_key(&conn)
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    /// Best-effort send: failures are logged, never returned.
    fn notify(&self, to: ConnectionId, message: Message) {
        if let Err(e) = self.deliver(to, message) {
            tracing::error!(%to, error = %e, "failed to send message");
        }
    }

    fn deliver(&self, to: ConnectionId, message: Message) -> Result<(), PairingError> {
        let sender = self.peers.get(&to).ok_or(PairingError::NotConnected(to))?;
        sender
            .send(message)
            .map_err(|_| PairingError::ChannelClosed(to))
    }
}

impl Default for Matchmaker {
    fn default() -> Self {
        Self::new(PairingConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================
