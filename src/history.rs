//! History backfill over request/response.
//!
//! One-shot fetch of the latest page at room-open, plus cursor-based older
//! pages on demand. The collaborator returns newest-first pages inside a
//! `{ data: { content: [...], last } }` envelope; this module unwraps the
//! envelope, decodes entries, and hands back ascending order.
//!
//! ERROR HANDLING
//! ==============
//! A failed fetch is non-fatal to the chat session: the caller logs it and
//! keeps the room usable with live messages only. A malformed entry inside
//! an otherwise valid page is dropped with a warning rather than failing
//! the whole page.

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::warn;

use crate::auth::Credential;
use crate::config::ChatConfig;
use wire::{ChatMessage, ChatRoom, RoomId};

/// Error surfaced by history fetches.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Transport-level request failure.
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Collaborator answered with a non-success status.
    #[error("history request returned HTTP {status}")]
    Status { status: u16 },
    /// Envelope is missing a required field.
    #[error("history payload missing `{0}`")]
    MissingField(&'static str),
    /// Envelope field has an unexpected shape.
    #[error("history payload decode failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// One decoded page of history.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Page contents in ascending chronological order.
    pub messages: Vec<ChatMessage>,
    /// Whether this page reaches the beginning of the room's history.
    pub last: bool,
}

/// Request/response client for the history feed and room metadata.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl HistoryClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Http`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &ChatConfig) -> Result<Self, HistoryError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            page_size: config.page_size,
        })
    }

    /// Fetch the newest page of a room's history.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] on transport failure, non-success status,
    /// or an unusable envelope.
    pub async fn fetch_latest(
        &self,
        room: RoomId,
        credential: &Credential,
    ) -> Result<HistoryPage, HistoryError> {
        self.fetch_page(room, credential, None).await
    }

    /// Fetch the page of messages older than `cursor_id`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`HistoryClient::fetch_latest`].
    pub async fn fetch_before(
        &self,
        room: RoomId,
        credential: &Credential,
        cursor_id: i64,
    ) -> Result<HistoryPage, HistoryError> {
        self.fetch_page(room, credential, Some(cursor_id)).await
    }

    async fn fetch_page(
        &self,
        room: RoomId,
        credential: &Credential,
        cursor_id: Option<i64>,
    ) -> Result<HistoryPage, HistoryError> {
        let url = format!("{}/api/rooms/{room}/messages", self.base_url);
        let mut query = vec![
            ("page".to_owned(), "0".to_owned()),
            ("size".to_owned(), self.page_size.to_string()),
        ];
        if let Some(cursor_id) = cursor_id {
            query.push(("cursorId".to_owned(), cursor_id.to_string()));
        }

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, credential.bearer())
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.json::<Value>().await?;
        decode_history_page(&body)
    }

    /// Fetch a room's metadata.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`HistoryClient::fetch_latest`].
    pub async fn fetch_room(
        &self,
        room: RoomId,
        credential: &Credential,
    ) -> Result<ChatRoom, HistoryError> {
        let url = format!("{}/api/rooms/{room}", self.base_url);
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, credential.bearer())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.json::<Value>().await?;
        decode_room(&body)
    }
}

/// Unwrap a history envelope into an ascending page.
///
/// The collaborator orders `content` newest-first; the returned page is
/// reversed into ascending order. Entries that fail to decode are dropped
/// with a warning.
///
/// # Errors
///
/// Returns [`HistoryError::MissingField`] when the envelope lacks `data`
/// or `content`.
pub fn decode_history_page(body: &Value) -> Result<HistoryPage, HistoryError> {
    let data = body.get("data").ok_or(HistoryError::MissingField("data"))?;
    let content = data
        .get("content")
        .and_then(Value::as_array)
        .ok_or(HistoryError::MissingField("content"))?;

    let mut messages: Vec<ChatMessage> = Vec::with_capacity(content.len());
    for entry in content {
        match wire::decode_message(entry) {
            Ok(message) => messages.push(message),
            Err(error) => warn!(%error, "dropping malformed history entry"),
        }
    }
    messages.reverse();

    let last = data.get("last").and_then(Value::as_bool).unwrap_or(false);
    Ok(HistoryPage { messages, last })
}

/// Unwrap a room metadata envelope.
///
/// # Errors
///
/// Returns [`HistoryError::MissingField`] when `data` is absent and
/// [`HistoryError::Payload`] when it has the wrong shape.
pub fn decode_room(body: &Value) -> Result<ChatRoom, HistoryError> {
    let data = body.get("data").ok_or(HistoryError::MissingField("data"))?;
    Ok(serde_json::from_value(data.clone())?)
}

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;
