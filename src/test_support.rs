//! Shared fixtures for unit tests: a scripted in-memory transport, a
//! minimal HTTP/1.1 stub, and message builders.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

use crate::transport::{Conduit, Connector, TransportError};
use wire::{ChatMessage, Frame, RoomId};

pub const ROOM: RoomId = RoomId(7);

pub fn message(id: i64) -> ChatMessage {
    ChatMessage {
        id,
        room_id: ROOM.0,
        sender_id: 9,
        sender_display_name: "mina".to_owned(),
        content: format!("message {id}"),
        created_at: time::macros::datetime!(2026-01-05 10:00:00 UTC) + time::Duration::minutes(id),
    }
}

pub fn message_payload(id: i64) -> Value {
    serde_json::to_value(message(id)).expect("message serializes")
}

// =============================================================================
// SCRIPTED TRANSPORT
// =============================================================================

pub struct FakeConduit {
    inbound: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    sent: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl Conduit for FakeConduit {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.sent.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.inbound.recv().await
    }
}

/// Hands out pre-scripted conduits, in order, one per `connect` call.
pub struct FakeConnector {
    conduits: Mutex<Vec<FakeConduit>>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Conduit>, TransportError> {
        let mut conduits = self.conduits.lock().expect("conduit mutex");
        if conduits.is_empty() {
            return Err(TransportError::Connect("no scripted conduit".to_owned()));
        }
        Ok(Box::new(conduits.remove(0)))
    }
}

/// Test-side handle to one scripted conduit.
pub struct ConduitHandle {
    push: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    sent: mpsc::UnboundedReceiver<Frame>,
}

impl ConduitHandle {
    /// Queue an inbound frame for the channel to read.
    pub fn push_frame(&self, frame: Frame) {
        let _ = self.push.send(Ok(frame));
    }

    /// Queue an inbound transport error.
    pub fn push_error(&self, error: TransportError) {
        let _ = self.push.send(Err(error));
    }

    /// Drop the inbound side, simulating the peer going away.
    pub fn sever(&mut self) {
        let (replacement, _unused) = mpsc::unbounded_channel();
        self.push = replacement;
    }

    /// Next frame the channel wrote to the wire.
    pub async fn next_sent(&mut self) -> Frame {
        timeout(Duration::from_millis(500), self.sent.recv())
            .await
            .expect("sent frame timed out")
            .expect("sent channel closed")
    }

    /// Assert nothing was written to the wire.
    pub async fn assert_no_sent(&mut self) {
        assert!(
            timeout(Duration::from_millis(80), self.sent.recv())
                .await
                .is_err(),
            "expected no outbound frame"
        );
    }
}

/// Build a connector scripted with `count` conduits and their handles.
pub fn scripted_connector(count: usize) -> (Arc<FakeConnector>, Vec<ConduitHandle>) {
    let mut conduits = Vec::with_capacity(count);
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let (push, inbound) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        conduits.push(FakeConduit {
            inbound,
            sent: sent_tx,
        });
        handles.push(ConduitHandle {
            push,
            sent: sent_rx,
        });
    }
    let connector = Arc::new(FakeConnector {
        conduits: Mutex::new(conduits),
    });
    (connector, handles)
}

// =============================================================================
// HTTP STUB
// =============================================================================

pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Minimal HTTP/1.1 responder serving scripted responses in order.
pub struct HttpStub {
    pub base_url: String,
    /// Request heads (start line + headers) in arrival order.
    pub requests: mpsc::UnboundedReceiver<String>,
    server: JoinHandle<()>,
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

pub async fn spawn_http_stub(responses: Vec<StubResponse>) -> HttpStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("stub bind");
    let addr = listener.local_addr().expect("stub addr");
    let (request_tx, request_rx) = mpsc::unbounded_channel();

    let server = tokio::spawn(async move {
        let mut responses = responses;
        responses.reverse();
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut head = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let Ok(read) = socket.read(&mut buf).await else {
                    return;
                };
                if read == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..read]);
                if head.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
            let _ = request_tx.send(String::from_utf8_lossy(&head).into_owned());

            let response = responses.pop().unwrap_or(StubResponse {
                status: 404,
                body: String::new(),
            });
            let text = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                response.status,
                reason(response.status),
                response.body.len(),
                response.body,
            );
            let _ = socket.write_all(text.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    HttpStub {
        base_url: format!("http://{addr}"),
        requests: request_rx,
        server,
    }
}

impl HttpStub {
    /// Next recorded request head.
    pub async fn next_request(&mut self) -> String {
        timeout(Duration::from_millis(500), self.requests.recv())
            .await
            .expect("request timed out")
            .expect("request channel closed")
    }
}

/// A history envelope body containing the given entries, newest-first.
pub fn history_body(entries: &[Value], last: bool) -> String {
    serde_json::json!({
        "data": {
            "content": entries,
            "last": last,
            "number": 0,
            "size": entries.len(),
        }
    })
    .to_string()
}
