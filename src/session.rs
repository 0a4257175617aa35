//! Chat session — the synchronizer gluing backfill, push stream, and store.
//!
//! DESIGN
//! ======
//! `open` runs the history fetch and the channel handshake concurrently;
//! they may complete in either order. Push events buffer inside the channel
//! until the caller pumps them, so the seed always lands first and every
//! interleaving converges on the same final message set — the dedup append
//! absorbs whatever the two paths both delivered.
//!
//! A failed backfill is logged and the room stays usable with live messages
//! only. A failed handshake surfaces to the caller while the session keeps
//! its (possibly seeded) history.
//!
//! Outbound sends are not inserted optimistically: the message appears when
//! the server broadcasts it back, so the rendered list always equals what
//! the server sent.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::channel::{ChannelError, ConnectionStatus, LiveChannel, PublishError};
use crate::config::{ChatConfig, ConfigError};
use crate::history::{HistoryClient, HistoryError};
use crate::store::MessageStore;
use crate::transport::WsConnector;
use wire::{ChatMessage, RoomId};

/// Error building a session from config.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// One room's live chat view: store, history, and channel, with the merge
/// policy between them.
///
/// A session is bound to exactly one room for its whole life; switching
/// rooms means closing this session and creating a new one. Dropping the
/// session tears the connection down.
pub struct ChatSession {
    room: RoomId,
    store: MessageStore,
    history: HistoryClient,
    channel: LiveChannel,
    end_of_history: bool,
}

impl ChatSession {
    /// Assemble a session from already-built parts.
    ///
    /// The channel must be bound to `room`; callers constructing parts by
    /// hand (tests, custom transports) are responsible for that.
    #[must_use]
    pub fn new(history: HistoryClient, channel: LiveChannel, room: RoomId) -> Self {
        Self {
            room,
            store: MessageStore::new(),
            history,
            channel,
            end_of_history: false,
        }
    }

    /// Build a session over the production websocket transport.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] when the base URL is unusable or the HTTP
    /// client cannot be constructed.
    pub fn over_websocket(config: &ChatConfig, room: RoomId) -> Result<Self, SetupError> {
        let history = HistoryClient::new(config)?;
        let channel = LiveChannel::new(
            std::sync::Arc::new(WsConnector),
            config.ws_url()?,
            room,
            config.handshake_timeout,
        );
        Ok(Self::new(history, channel, room))
    }

    /// The room this session is bound to.
    #[must_use]
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Open the session: backfill and connect concurrently.
    ///
    /// A backfill failure is non-fatal (logged; the store stays empty and
    /// live messages still accumulate). The connection result is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the handshake fails; the caller owns
    /// credential refresh and retry.
    pub async fn open(&mut self, credential: &Credential) -> Result<(), ChannelError> {
        let room = self.room;
        let history = &self.history;
        let channel = &mut self.channel;
        let (page, connected) = tokio::join!(
            history.fetch_latest(room, credential),
            channel.open(credential),
        );

        match page {
            Ok(page) => {
                self.end_of_history = page.last;
                self.store.seed(page.messages);
                debug!(room = %self.room, seeded = self.store.len(), "history seeded");
            }
            Err(error) => {
                warn!(room = %self.room, %error, "history backfill failed; continuing with live feed only");
            }
        }

        connected
    }

    /// Pump the next live message into the store.
    ///
    /// Duplicate deliveries (backfill/push races, echoes already seen) are
    /// swallowed; only messages actually inserted are yielded. Returns
    /// `None` once the channel is closed or the connection has dropped.
    pub async fn next_message(&mut self) -> Option<ChatMessage> {
        while let Some(message) = self.channel.next_message().await {
            if self.store.append(message.clone()) {
                return Some(message);
            }
            debug!(id = message.id, "duplicate push delivery ignored");
        }
        None
    }

    /// Send a message to the room.
    ///
    /// Rejected input never reaches the transport and never mutates the
    /// store, so the caller can keep the text and retry.
    ///
    /// # Errors
    ///
    /// [`PublishError::EmptyContent`] for blank input,
    /// [`PublishError::NotConnected`] unless the channel is connected.
    pub fn send(&self, text: &str) -> Result<(), PublishError> {
        if text.trim().is_empty() {
            return Err(PublishError::EmptyContent);
        }
        self.channel.publish(text)
    }

    /// The current ascending message view.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    /// Current connection state, mirrored from the channel.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.channel.status()
    }

    /// Watch handle for connection state transitions.
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.channel.status_watch()
    }

    /// Whether the oldest stored message is the first in the room.
    #[must_use]
    pub fn end_of_history(&self) -> bool {
        self.end_of_history
    }

    /// Fetch and merge the page older than the current oldest message.
    ///
    /// Returns the number of messages added. No-ops once the start of the
    /// room's history has been reached.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] when the fetch fails; the store is left
    /// untouched.
    pub async fn load_older(&mut self, credential: &Credential) -> Result<usize, HistoryError> {
        if self.end_of_history {
            return Ok(0);
        }
        let page = match self.store.oldest_id() {
            Some(cursor) => self.history.fetch_before(self.room, credential, cursor).await?,
            None => self.history.fetch_latest(self.room, credential).await?,
        };
        self.end_of_history = page.last;
        Ok(self.store.prepend_older(page.messages))
    }

    /// Tear down the live connection. Idempotent; the stored history
    /// remains readable afterwards.
    pub fn close(&mut self) {
        self.channel.close();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
