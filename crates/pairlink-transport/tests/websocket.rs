//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and drive it with a
//! `tokio-tungstenite` client, so frames actually cross the loopback.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use pairlink_transport::{
        Connection, DEFAULT_PATH, Transport, TransportError, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0 and returns the transport plus its `host:port`.
    async fn bind_any() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0", DEFAULT_PATH)
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn connect_client(addr: &str, path: &str) -> ClientWs {
        let url = format!("ws://{addr}{path}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_any().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr, DEFAULT_PATH).await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);

        // JSON goes out as a Text frame.
        server_conn
            .send(br#"{"name":"PARTNER_LEFT"}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "utf-8 payloads should be text frames");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"name":"PARTNER_LEFT"}"#);

        client_ws
            .send(Message::Text(r#"{"name":"PAIRING_START"}"#.to_string().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, br#"{"name":"PAIRING_START"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_non_utf8_uses_binary_frame() {
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr, DEFAULT_PATH).await;
        let server_conn = server_handle.await.unwrap();

        server_conn.send(&[0xff, 0xfe]).await.unwrap();

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().to_vec(), vec![0xff, 0xfe]);
    }

    #[tokio::test]
    async fn test_websocket_send_does_not_wait_for_pending_recv() {
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr, DEFAULT_PATH).await;
        let server_conn =
            std::sync::Arc::new(server_handle.await.unwrap());

        // Park a reader on the connection, then write through it.
        let reader = std::sync::Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::task::yield_now().await;

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send(b"hello"),
        )
        .await
        .expect("send should not block behind recv")
        .unwrap();

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = pending.await.unwrap().unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr, DEFAULT_PATH).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_ping_reaches_client() {
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });
        let mut client_ws = connect_client(&addr, DEFAULT_PATH).await;
        let server_conn = server_handle.await.unwrap();

        server_conn.ping().await.expect("ping should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_ping());
    }

    #[tokio::test]
    async fn test_websocket_unknown_path_is_rejected() {
        let (mut transport, addr) = bind_any().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await });

        let url = format!("ws://{addr}/somewhere-else");
        let client = tokio_tungstenite::connect_async(&url).await;
        assert!(client.is_err(), "client should see the 404");

        let accepted = server_handle.await.unwrap();
        assert!(
            matches!(accepted, Err(TransportError::Rejected(ref p)) if p == "/somewhere-else"),
            "accept should report the rejected path"
        );
    }

    #[tokio::test]
    async fn test_websocket_silent_client_does_not_block_accept() {
        let (mut transport, addr) = bind_any().await;

        // Connects but never sends the upgrade request.
        let _silent = tokio::net::TcpStream::connect(addr.as_str()).await.unwrap();

        let server_handle = tokio::spawn(async move { transport.accept().await });
        let client = tokio::time::timeout(
            Duration::from_secs(3),
            connect_client(&addr, DEFAULT_PATH),
        )
        .await;
        assert!(client.is_ok(), "a stalled handshake should not hold up others");

        let accepted = server_handle.await.unwrap();
        assert!(accepted.is_ok(), "the upgraded client is handed out first");
    }

    #[tokio::test]
    async fn test_websocket_handshake_timeout_reports_peer() {
        let mut transport = WebSocketTransport::bind_with_timeout(
            "127.0.0.1:0",
            DEFAULT_PATH,
            Duration::from_millis(100),
        )
        .await
        .expect("should bind");
        let addr = transport.local_addr().unwrap();

        let silent = tokio::net::TcpStream::connect(addr).await.unwrap();
        let silent_addr = silent.local_addr().unwrap();

        let accepted = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept should report the timeout");
        assert!(
            matches!(accepted, Err(TransportError::HandshakeTimedOut(peer)) if peer == silent_addr)
        );
    }

    #[tokio::test]
    async fn test_websocket_accept_after_shutdown_returns_shutdown() {
        let (mut transport, _addr) = bind_any().await;
        assert_eq!(transport.path(), DEFAULT_PATH);

        transport.shutdown().await.expect("shutdown should succeed");

        let accepted = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept should not hang after shutdown");
        assert!(matches!(accepted, Err(TransportError::Shutdown)));
    }
}
