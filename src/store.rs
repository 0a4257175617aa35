//! Message store — ordered, deduplicated message list for one room.
//!
//! DESIGN
//! ======
//! Arena + index: an ascending `Vec` holds the render order, a `HashSet` of
//! known ids answers membership in O(1). Every mutation goes through the id
//! set, so no code path can introduce a duplicate.
//!
//! `seed` merges rather than blindly replacing: a push event that raced in
//! ahead of the backfill survives the seed, and the later duplicate
//! delivery of the same message (from either path) is a no-op. That merge
//! is what makes the backfill/push interleaving order-independent.
//!
//! `append` trusts the push stream's chronological delivery and never
//! reorders; the seeded prefix is sorted here because the history
//! collaborator hands pages back newest-first.

use std::cmp::Ordering;
use std::collections::HashSet;

use wire::ChatMessage;

/// Ascending comparison: timestamp first, server-assigned id as tie-break.
fn chronological(a: &ChatMessage, b: &ChatMessage) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Ordered, duplicate-free collection of one room's chat messages.
///
/// Single source of truth for rendering. Owned by exactly one room view
/// and dropped with it.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    ids: HashSet<i64>,
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a history page, in any order.
    ///
    /// The result is ascending by `(created_at, id)` regardless of the page
    /// order the collaborator returned. Messages already present (a push
    /// event that won the race against the backfill) are kept; duplicate
    /// ids within the page collapse to their first occurrence.
    pub fn seed(&mut self, page: Vec<ChatMessage>) {
        let mut merged = page;
        merged.extend(self.messages.drain(..));
        merged.sort_by(chronological);
        self.ids.clear();
        for message in merged {
            if self.ids.insert(message.id) {
                self.messages.push(message);
            }
        }
    }

    /// Append a message at the tail unless its id is already present.
    ///
    /// Returns whether the message was inserted; a duplicate id is a no-op,
    /// not an error. The push stream delivers chronologically, so no
    /// reordering happens here.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Merge an older history page in front of the current contents.
    ///
    /// Returns how many messages were actually added; ids already present
    /// are skipped. Used by cursor pagination.
    pub fn prepend_older(&mut self, page: Vec<ChatMessage>) -> usize {
        let mut fresh: Vec<ChatMessage> = Vec::with_capacity(page.len());
        for message in page {
            if self.ids.insert(message.id) {
                fresh.push(message);
            }
        }
        fresh.sort_by(chronological);
        let added = fresh.len();
        fresh.extend(self.messages.drain(..));
        self.messages = fresh;
        added
    }

    /// The current ascending view. Pure; safe to call on every render.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether a message with this id is already present.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Id of the oldest stored message, the cursor for older-page fetches.
    #[must_use]
    pub fn oldest_id(&self) -> Option<i64> {
        self.messages.first().map(|message| message.id)
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
