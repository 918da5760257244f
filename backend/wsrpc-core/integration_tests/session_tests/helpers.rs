//! Test helpers for session integration tests.
//!
//! This module provides utilities for driving a real session over a loopback
//! WebSocket:
//! - A peer server that accepts one connection at a time
//! - Sending/receiving envelope payloads on the peer side
//! - An observer that forwards callbacks into a channel

use wsrpc_core::router::InvocationRouter;
use wsrpc_core::{
    Envelope, Payload, Session, SessionObserver, TransportError, WorkerDispatch,
};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

pub type PeerSocket = WebSocketStream<TcpStream>;

/// Test helper: The remote end of a session.
pub struct TestPeer {
    listener: TcpListener,
}

impl TestPeer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test peer");
        Self { listener }
    }

    pub fn url(&self) -> String {
        let port = self.listener.local_addr().expect("No local addr").port();
        format!("ws://127.0.0.1:{port}/ws")
    }

    /// Accepts the next session connection and completes the handshake.
    pub async fn accept(&self) -> PeerSocket {
        let (stream, _) = timeout(WAIT, self.listener.accept())
            .await
            .expect("Timed out waiting for session to connect")
            .expect("Failed to accept connection");
        accept_async(stream)
            .await
            .expect("WebSocket handshake failed")
    }
}

/// Test helper: Send a payload from the peer.
pub async fn send_payload(ws: &mut PeerSocket, payload: Payload) {
    let frame = Envelope::encode(&payload)
        .and_then(|envelope| envelope.to_frame())
        .expect("Failed to encode payload");
    ws.send(Message::Text(frame.into()))
        .await
        .expect("Failed to send frame");
}

/// Test helper: Receive and decode the next text frame on the peer.
pub async fn receive_payload(ws: &mut PeerSocket) -> Payload {
    loop {
        let message = timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .expect("Error receiving frame");

        if let Message::Text(text) = message {
            return Envelope::decode(text.as_str())
                .and_then(|envelope| envelope.decode_payload())
                .expect("Failed to decode frame");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Open,
    Connected(String),
    Text(String),
    Close { code: u16, was_clean: bool },
    Error(String),
}

/// Test helper: Observer that forwards every callback into a channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Observed>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Observed>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn push(&self, event: Observed) {
        let _ = self.tx.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_open(&self, _session: &Session) {
        self.push(Observed::Open);
    }

    fn on_connected(&self, _session: &Session, connection_id: &str) {
        self.push(Observed::Connected(connection_id.to_string()));
    }

    fn on_text_message(&self, _session: &Session, text: &str) {
        self.push(Observed::Text(text.to_string()));
    }

    fn on_close(&self, _session: &Session, code: u16, _reason: &str, was_clean: bool) {
        self.push(Observed::Close { code, was_clean });
    }

    fn on_error(&self, _session: &Session, error: &TransportError) {
        self.push(Observed::Error(error.to_string()));
    }
}

/// Test helper: Wait for the next observer callback.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    timeout(WAIT, events.recv())
        .await
        .expect("Timed out waiting for observer event")
        .expect("Observer channel closed")
}

/// Test helper: Handlers the peer can call.
pub fn demo_router() -> InvocationRouter {
    let mut router = InvocationRouter::new();
    router
        .register("echo", |text: String| -> Result<String, String> { Ok(text) })
        .register("add", |a: i32, b: i32| -> Result<i32, String> { Ok(a + b) });
    router
}

/// Test helper: Build a session against `url` running on a dispatch worker.
pub fn build_session(url: &str, observer: Arc<ChannelObserver>) -> Session {
    let worker = WorkerDispatch::spawn().expect("Failed to spawn dispatch worker");
    Session::builder(url)
        .with_router(demo_router())
        .with_observer(observer)
        .with_dispatch_context(Arc::new(worker))
        .with_log_frames(true)
        .build()
}

/// Test helper: Start a session and wait until both ends see the connection.
pub async fn connect_session(
    peer: &TestPeer,
) -> (Session, PeerSocket, mpsc::UnboundedReceiver<Observed>) {
    let (observer, mut events) = ChannelObserver::new();
    let session = build_session(&peer.url(), observer);

    session.start();
    let ws = peer.accept().await;
    assert_eq!(next_event(&mut events).await, Observed::Open);

    (session, ws, events)
}
