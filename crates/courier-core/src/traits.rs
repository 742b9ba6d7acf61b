// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The store trait boundary between the sender loop and the persistence backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CourierError;
use crate::types::{
    Endpoint, MessageBookmark, MessageId, OutgoingStats, PersistentMessage,
    PersistentMessageToSend,
};

/// Durable store for outbound messages.
///
/// Implementations track every message this node must deliver, move each one
/// through ready → in-flight → sent-or-retried-or-dead, and guarantee that no
/// message is lost or duplicated across process crashes. Each operation runs
/// as a single storage transaction; a crash between [`select_batch`] and the
/// matching completion call leaves the affected rows durably in-flight, and
/// un-sticking those is the job of external operational tooling.
///
/// [`select_batch`]: OutboxStore::select_batch
#[async_trait]
pub trait OutboxStore {
    /// Initializes the backend (runs migrations, opens connections).
    async fn initialize(&self) -> Result<(), CourierError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), CourierError>;

    /// Inserts a new live message with status Ready and a retry count of zero.
    /// The message becomes eligible for selection once `time_to_send` passes.
    async fn enqueue(
        &self,
        endpoint: &Endpoint,
        queue: &str,
        subqueue: Option<&str>,
        data: &[u8],
        time_to_send: DateTime<Utc>,
    ) -> Result<MessageId, CourierError>;

    /// Selects a batch of due, ready messages for one destination endpoint and
    /// marks them in-flight in the same transaction.
    ///
    /// The endpoint of the first eligible row fixes the batch destination;
    /// rows for other endpoints are left alone for a later call. Both caps
    /// are checked after each addition, so the batch may exceed either bound
    /// by at most one message. Returns an empty batch and no endpoint when
    /// nothing is eligible.
    async fn select_batch(
        &self,
        max_count: usize,
        max_total_bytes: usize,
    ) -> Result<(Vec<PersistentMessage>, Option<Endpoint>), CourierError>;

    /// Reports a failed transmission for the message behind `bookmark`.
    ///
    /// Requeues it Ready with quadratic backoff, unless its retry budget is
    /// exhausted or `destination_queue_missing` is set, in which case it is
    /// archived to history and removed from the live store.
    async fn mark_failed_transmission(
        &self,
        bookmark: &MessageBookmark,
        destination_queue_missing: bool,
    ) -> Result<(), CourierError>;

    /// Reports a successful transmission: archives the message to history and
    /// removes it from the live store, returning a bookmark to the archived
    /// copy.
    async fn mark_successfully_sent(
        &self,
        bookmark: &MessageBookmark,
    ) -> Result<MessageBookmark, CourierError>;

    /// Lists every live message, regardless of status or due time.
    async fn list_pending_outgoing(&self) -> Result<Vec<PersistentMessageToSend>, CourierError>;

    /// Lists every archived message in the history store.
    async fn list_sent_history(&self) -> Result<Vec<PersistentMessageToSend>, CourierError>;

    /// Copies archived messages back into the live store with fresh
    /// identities and status Ready, leaving the history rows untouched.
    async fn revert_to_ready(&self, bookmarks: &[MessageBookmark]) -> Result<(), CourierError>;

    /// Counts messages per lifecycle stage.
    async fn outgoing_stats(&self) -> Result<OutgoingStats, CourierError>;
}
