//! Crewdeck realtime chat synchronization core.
//!
//! ARCHITECTURE
//! ============
//! A room view owns exactly one [`ChatSession`], which glues three parts
//! together:
//!
//! - [`MessageStore`]: the ordered, deduplicated message list and single
//!   source of truth for rendering.
//! - [`HistoryClient`]: one-shot request/response backfill of the latest
//!   history page (plus cursor pagination for older pages).
//! - [`LiveChannel`]: the persistent-connection state machine — connect,
//!   authenticate, subscribe, publish, teardown — bound to a single room.
//!
//! On open, the backfill and the channel handshake run concurrently; push
//! events buffer until the seed lands, and the store's dedup-append makes
//! the final message set independent of arrival interleaving. Outbound
//! sends are never inserted optimistically: the sender sees its own message
//! only once the server broadcasts it back, so the store always equals
//! exactly what the server sent.
//!
//! Everything here is single-owner and event-driven; correctness comes
//! from idempotent operations (dedup append, idempotent close), not locks.

pub mod auth;
pub mod channel;
pub mod config;
pub mod history;
pub mod session;
pub mod store;
#[cfg(test)]
pub mod test_support;
pub mod transport;

pub use auth::Credential;
pub use channel::{ChannelError, ConnectionStatus, LiveChannel, PublishError};
pub use config::{ChatConfig, ConfigError};
pub use history::{HistoryClient, HistoryError, HistoryPage};
pub use session::{ChatSession, SetupError};
pub use store::MessageStore;
pub use transport::{Conduit, Connector, TransportError, WsConnector};
pub use wire::{ChatMessage, ChatRoom, Frame, Op, RoomId};
