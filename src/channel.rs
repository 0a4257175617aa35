//! Live channel — persistent-connection state machine for one room.
//!
//! LIFECYCLE
//! =========
//! 1. `open` → dial, send `connect{token}`, await `connected` (bounded),
//!    send `subscribe` for the room topic, spawn the run task.
//! 2. The run task relays: outbound queue → conduit, conduit → decoded
//!    chat messages, in transport delivery order, exactly once each.
//! 3. Any transport failure, stream end, or explicit `close` returns the
//!    channel to `Disconnected`. `close` is synchronous and idempotent;
//!    after it returns, `next_message` yields nothing.
//!
//! There is no automatic reconnect: a dropped connection leaves the channel
//! `Disconnected` and `open` may be called again by whoever owns the
//! credential and the retry policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::Credential;
use crate::transport::{Conduit, Connector, TransportError};
use wire::{ChatMessage, Frame, Op, RoomId};

/// Connection state of one live channel.
///
/// Serializes lowercase for presentation layers that render the indicator
/// from state dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Error surfaced by `open`.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Dial, handshake send, or subscribe send failed at transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server refused the handshake (invalid or expired credential).
    #[error("handshake rejected: {message}")]
    HandshakeRejected { message: String },
    /// No handshake acknowledgment within the configured bound.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// Error surfaced by `publish` and `send`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PublishError {
    /// The channel is not connected; nothing was sent or queued.
    #[error("not connected")]
    NotConnected,
    /// The content is empty or whitespace-only.
    #[error("empty message content")]
    EmptyContent,
}

/// Live connection bound to a single room's topic pair.
///
/// One instance owns at most one underlying transport connection and one
/// topic subscription. Switching rooms means closing this instance and
/// constructing a new one; instances are never reused across rooms.
pub struct LiveChannel {
    room: RoomId,
    url: String,
    connector: Arc<dyn Connector>,
    handshake_timeout: Duration,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
    runtime: Option<Runtime>,
}

/// Live connection resources; present only while open.
struct Runtime {
    outbound: mpsc::UnboundedSender<Frame>,
    events: mpsc::UnboundedReceiver<ChatMessage>,
    task: JoinHandle<()>,
}

impl LiveChannel {
    /// Create a disconnected channel for `room`.
    pub fn new(
        connector: Arc<dyn Connector>,
        url: impl Into<String>,
        room: RoomId,
        handshake_timeout: Duration,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            room,
            url: url.into(),
            connector,
            handshake_timeout,
            status_tx,
            status_rx,
            runtime: None,
        }
    }

    /// The room this channel is bound to.
    #[must_use]
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch handle for observing state transitions.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Connect, authenticate, and subscribe to the room topic.
    ///
    /// No-op when already connecting or connected. On failure the channel
    /// is back at `Disconnected` and may be opened again; credential
    /// refresh and retry policy belong to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the dial, handshake, or subscribe
    /// fails or times out.
    pub async fn open(&mut self, credential: &Credential) -> Result<(), ChannelError> {
        if self.status() != ConnectionStatus::Disconnected {
            return Ok(());
        }
        // A previous connection may have died on its own; reap it before
        // dialing so only one transport connection ever exists per channel.
        self.teardown();

        self.status_tx.send_replace(ConnectionStatus::Connecting);
        match self.connect_and_subscribe(credential).await {
            Ok(conduit) => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                let task = tokio::spawn(run_channel(
                    conduit,
                    outbound_rx,
                    event_tx,
                    self.room.topic(),
                    self.status_tx.clone(),
                ));
                self.runtime = Some(Runtime {
                    outbound: outbound_tx,
                    events: event_rx,
                    task,
                });
                self.status_tx.send_replace(ConnectionStatus::Connected);
                info!(room = %self.room, "live channel connected");
                Ok(())
            }
            Err(error) => {
                self.status_tx.send_replace(ConnectionStatus::Disconnected);
                Err(error)
            }
        }
    }

    async fn connect_and_subscribe(
        &self,
        credential: &Credential,
    ) -> Result<Box<dyn Conduit>, ChannelError> {
        let mut conduit = self.connector.connect(&self.url).await?;
        conduit.send(Frame::connect(credential.token())).await?;

        tokio::time::timeout(self.handshake_timeout, await_connected(&mut *conduit))
            .await
            .map_err(|_| ChannelError::HandshakeTimeout)??;

        conduit.send(Frame::subscribe(self.room.topic())).await?;
        Ok(conduit)
    }

    /// Queue a message publish to the room's send destination.
    ///
    /// Fire-and-forget: no acknowledgment is correlated to the call. The
    /// sender observes success when the server's broadcast echoes the
    /// message back through the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NotConnected`] unless the channel is
    /// currently connected; nothing is queued in that case.
    pub fn publish(&self, content: &str) -> Result<(), PublishError> {
        if self.status() != ConnectionStatus::Connected {
            return Err(PublishError::NotConnected);
        }
        let Some(runtime) = &self.runtime else {
            return Err(PublishError::NotConnected);
        };
        let frame = Frame::publish(self.room.send_destination(), content);
        runtime
            .outbound
            .send(frame)
            .map_err(|_| PublishError::NotConnected)
    }

    /// Next chat message pushed on the subscribed topic.
    ///
    /// Messages arrive in transport delivery order, exactly once each.
    /// Returns `None` once the channel is closed or the connection has
    /// dropped and everything delivered has been consumed.
    pub async fn next_message(&mut self) -> Option<ChatMessage> {
        match &mut self.runtime {
            Some(runtime) => runtime.events.recv().await,
            None => None,
        }
    }

    /// Release the connection. Safe to call any number of times; after it
    /// returns no further message is delivered by this instance.
    pub fn close(&mut self) {
        self.teardown();
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    fn teardown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.task.abort();
            debug!(room = %self.room, "live channel torn down");
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Read frames until the handshake resolves.
async fn await_connected(conduit: &mut dyn Conduit) -> Result<(), ChannelError> {
    loop {
        match conduit.recv().await {
            None => return Err(TransportError::Closed.into()),
            Some(Err(error)) => return Err(error.into()),
            Some(Ok(frame)) => match frame.op {
                Op::Connected => return Ok(()),
                Op::Error => {
                    return Err(ChannelError::HandshakeRejected {
                        message: frame
                            .error_message()
                            .unwrap_or("handshake rejected")
                            .to_owned(),
                    });
                }
                // Nothing else is expected before the acknowledgment.
                _ => {}
            },
        }
    }
}

/// Connection run loop: relay outbound frames and decode inbound events
/// until either side goes away.
async fn run_channel(
    mut conduit: Box<dyn Conduit>,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<ChatMessage>,
    topic: String,
    status: watch::Sender<ConnectionStatus>,
) {
    loop {
        tokio::select! {
            inbound = conduit.recv() => {
                match inbound {
                    None => break,
                    Some(Ok(frame)) => handle_inbound(frame, &topic, &events),
                    Some(Err(TransportError::Codec(error))) => {
                        warn!(%error, "dropping undecodable frame");
                    }
                    Some(Err(error)) => {
                        warn!(%error, "live channel transport error");
                        break;
                    }
                }
            }
            queued = outbound.recv() => {
                let Some(frame) = queued else { break };
                if let Err(error) = conduit.send(frame).await {
                    warn!(%error, "live channel send failed");
                    break;
                }
            }
        }
    }
    status.send_replace(ConnectionStatus::Disconnected);
}

fn handle_inbound(frame: Frame, topic: &str, events: &mpsc::UnboundedSender<ChatMessage>) {
    match frame.op {
        Op::Event => {
            if frame.topic.as_deref() != Some(topic) {
                debug!(topic = ?frame.topic, "ignoring event for unsubscribed topic");
                return;
            }
            match wire::decode_message(&frame.data) {
                Ok(message) => {
                    let _ = events.send(message);
                }
                Err(error) => warn!(%error, "dropping malformed chat payload"),
            }
        }
        Op::Error => {
            warn!(
                message = frame.error_message().unwrap_or("unknown"),
                "server error frame"
            );
        }
        // Handshake acknowledgments are consumed before the run loop; any
        // other client-originated op echoed back is meaningless here.
        _ => {}
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod channel_test;
