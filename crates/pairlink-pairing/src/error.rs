//! Error types for the pairing layer.

use pairlink_transport::ConnectionId;

use crate::ExchangeId;

/// Errors that can occur during pairing operations.
///
/// None of these ever reach a client. `AlreadyQueued` and
/// `UnknownExchange` mean the pool's bookkeeping is broken; the others are
/// delivery failures that get logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    /// The connection is already referenced by a pool record.
    #[error("{0} is already in an exchange")]
    AlreadyQueued(ConnectionId),

    /// The exchange is no longer in the pool.
    #[error("exchange {0} not found")]
    UnknownExchange(ExchangeId),

    /// The connection was registered twice.
    #[error("{0} is already connected")]
    AlreadyConnected(ConnectionId),

    /// No outbound channel is registered for the connection.
    #[error("{0} is not connected")]
    NotConnected(ConnectionId),

    /// The connection's outbound channel has been closed.
    #[error("outbound channel for {0} is closed")]
    ChannelClosed(ConnectionId),
}
