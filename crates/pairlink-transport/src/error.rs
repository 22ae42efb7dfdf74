/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The client asked to upgrade on a path this transport doesn't serve.
    #[error("upgrade rejected: {0}")]
    Rejected(String),

    /// The client didn't finish the upgrade handshake in time.
    #[error("upgrade handshake from {0} timed out")]
    HandshakeTimedOut(std::net::SocketAddr),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_includes_path() {
        let err = TransportError::Rejected("/nope".into());
        assert_eq!(err.to_string(), "upgrade rejected: /nope");
    }

    #[test]
    fn test_handshake_timed_out_display_includes_peer() {
        let addr: std::net::SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let err = TransportError::HandshakeTimedOut(addr);
        assert_eq!(err.to_string(), "upgrade handshake from 127.0.0.1:4000 timed out");
    }

    #[test]
    fn test_send_failed_exposes_source() {
        use std::error::Error;
        let err = TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe",
        ));
        assert!(err.source().is_some());
    }
}
