//! Unified error type for the Pairlink server.

use pairlink_pairing::PairingError;
use pairlink_protocol::ProtocolError;
use pairlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PairlinkError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A pairing-level error (broken pool bookkeeping, registration).
    #[error(transparent)]
    Pairing(#[from] PairingError),

    /// The server configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use pairlink_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Rejected("/gone".into());
        let pairlink_err: PairlinkError = err.into();
        assert!(matches!(pairlink_err, PairlinkError::Transport(_)));
        assert!(pairlink_err.to_string().contains("/gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let pairlink_err: PairlinkError = err.into();
        assert!(matches!(pairlink_err, PairlinkError::Protocol(_)));
    }

    #[test]
    fn test_from_pairing_error() {
        let err = PairingError::AlreadyConnected(ConnectionId::new(3));
        let pairlink_err: PairlinkError = err.into();
        assert!(matches!(pairlink_err, PairlinkError::Pairing(_)));
        assert_eq!(pairlink_err.to_string(), "conn-3 is already connected");
    }
}
