// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message model types shared between the store trait and its SQLite backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Composite identity of a persistent message.
///
/// `instance` identifies the owning node's database; `number` is the local
/// sequence number assigned at enqueue time. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    /// Identifier of the database that owns this message.
    pub instance: Uuid,
    /// Locally-unique sequence number within that database.
    pub number: i64,
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.instance, self.number)
    }
}

/// Network destination for outgoing messages.
///
/// Two endpoints with the same address and port are the same destination
/// for batching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Delivery status of an outgoing message.
///
/// Live rows are always `Ready` or `InFlight`; `Sent` only ever appears in
/// the history store and marks a row that left the live store, whether the
/// delivery actually succeeded or the retry budget ran out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum OutgoingMessageStatus {
    /// Eligible for selection once its due time passes.
    Ready,
    /// Claimed by a sender; delivery outcome not yet reported.
    InFlight,
    /// Archived to history.
    Sent,
}

/// Which physical store a bookmark was captured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookmarkStore {
    Outgoing,
    OutgoingHistory,
}

/// Stable, non-owning reference to a physical row.
///
/// A bookmark stays valid for re-seeking until the row it references is
/// deleted; resolving one is always fallible. Bookmarks are never portable
/// across stores: one captured against the live store cannot address the
/// history store, and vice versa. Callers must treat the contents as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageBookmark {
    store: BookmarkStore,
    row_id: i64,
}

impl MessageBookmark {
    /// Bookmark into the live outgoing store.
    pub fn outgoing(row_id: i64) -> Self {
        Self {
            store: BookmarkStore::Outgoing,
            row_id,
        }
    }

    /// Bookmark into the outgoing-history store.
    pub fn history(row_id: i64) -> Self {
        Self {
            store: BookmarkStore::OutgoingHistory,
            row_id,
        }
    }

    pub fn store(&self) -> BookmarkStore {
        self.store
    }

    pub fn row_id(&self) -> i64 {
        self.row_id
    }
}

/// A message awaiting (or having been selected for) delivery.
///
/// Snapshot of one live-store row at the moment it was scanned, plus the
/// bookmark needed to re-locate that exact row for the completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentMessage {
    pub id: MessageId,
    pub queue: String,
    pub subqueue: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub data: Vec<u8>,
    pub bookmark: MessageBookmark,
}

/// Read-only projection used for listing and diagnostics.
///
/// Adds the delivery status and destination endpoint to the
/// [`PersistentMessage`] fields. Never used for mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentMessageToSend {
    pub id: MessageId,
    pub status: OutgoingMessageStatus,
    pub endpoint: Endpoint,
    pub queue: String,
    pub subqueue: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub data: Vec<u8>,
    pub bookmark: MessageBookmark,
}

/// Counts of messages per lifecycle stage, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutgoingStats {
    /// Live rows eligible for selection.
    pub ready: usize,
    /// Live rows claimed by a sender.
    pub in_flight: usize,
    /// Archived rows in the history store.
    pub history: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn endpoint_equality_is_by_value() {
        let a = Endpoint::new("10.0.0.1", 9999);
        let b = Endpoint::new("10.0.0.1", 9999);
        let c = Endpoint::new("10.0.0.1", 9998);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "10.0.0.1:9999");
    }

    #[test]
    fn status_text_round_trips() {
        for status in [
            OutgoingMessageStatus::Ready,
            OutgoingMessageStatus::InFlight,
            OutgoingMessageStatus::Sent,
        ] {
            let text = status.to_string();
            let parsed = OutgoingMessageStatus::from_str(&text).unwrap();
            assert_eq!(status, parsed);
        }
        assert_eq!(OutgoingMessageStatus::InFlight.to_string(), "in_flight");
        assert!(OutgoingMessageStatus::from_str("bogus").is_err());
    }

    #[test]
    fn bookmarks_carry_their_store() {
        let live = MessageBookmark::outgoing(42);
        let archived = MessageBookmark::history(42);
        assert_eq!(live.store(), BookmarkStore::Outgoing);
        assert_eq!(archived.store(), BookmarkStore::OutgoingHistory);
        assert_eq!(live.row_id(), archived.row_id());
        assert_ne!(live, archived);
    }

    #[test]
    fn message_id_display() {
        let id = MessageId {
            instance: Uuid::nil(),
            number: 7,
        };
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000/7");
    }
}
