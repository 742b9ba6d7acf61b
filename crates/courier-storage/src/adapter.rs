// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`OutboxStore`] implementation backed by SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use courier_core::{
    CourierError, Endpoint, MessageBookmark, MessageId, OutboxStore, OutgoingStats,
    PersistentMessage, PersistentMessageToSend, StorageConfig,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed outbox store.
///
/// Holds the database handle in a `OnceCell` so the adapter can be
/// constructed cheaply and shared before [`OutboxStore::initialize`] runs.
pub struct SqliteOutbox {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteOutbox {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, CourierError> {
        self.db
            .get()
            .ok_or_else(|| CourierError::Internal("storage is not initialized".into()))
    }
}

#[async_trait]
impl OutboxStore for SqliteOutbox {
    async fn initialize(&self) -> Result<(), CourierError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| CourierError::Internal("storage is already initialized".into()))
    }

    async fn close(&self) -> Result<(), CourierError> {
        // The handle stays usable for a process-exit flush; checkpointing the
        // WAL is the durable part of close.
        self.db()?
            .connection()
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn enqueue(
        &self,
        endpoint: &Endpoint,
        queue: &str,
        subqueue: Option<&str>,
        data: &[u8],
        time_to_send: DateTime<Utc>,
    ) -> Result<MessageId, CourierError> {
        queries::outgoing::enqueue(self.db()?, endpoint, queue, subqueue, data, time_to_send).await
    }

    async fn select_batch(
        &self,
        max_count: usize,
        max_total_bytes: usize,
    ) -> Result<(Vec<PersistentMessage>, Option<Endpoint>), CourierError> {
        queries::outgoing::select_batch(self.db()?, max_count, max_total_bytes).await
    }

    async fn mark_failed_transmission(
        &self,
        bookmark: &MessageBookmark,
        destination_queue_missing: bool,
    ) -> Result<(), CourierError> {
        queries::outgoing::mark_failed_transmission(self.db()?, bookmark, destination_queue_missing)
            .await
    }

    async fn mark_successfully_sent(
        &self,
        bookmark: &MessageBookmark,
    ) -> Result<MessageBookmark, CourierError> {
        queries::outgoing::mark_successfully_sent(self.db()?, bookmark).await
    }

    async fn list_pending_outgoing(&self) -> Result<Vec<PersistentMessageToSend>, CourierError> {
        queries::history::list_pending_outgoing(self.db()?).await
    }

    async fn list_sent_history(&self) -> Result<Vec<PersistentMessageToSend>, CourierError> {
        queries::history::list_sent_history(self.db()?).await
    }

    async fn revert_to_ready(&self, bookmarks: &[MessageBookmark]) -> Result<(), CourierError> {
        queries::history::revert_to_ready(self.db()?, bookmarks).await
    }

    async fn outgoing_stats(&self) -> Result<OutgoingStats, CourierError> {
        queries::history::outgoing_stats(self.db()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use courier_core::OutgoingMessageStatus;
    use tempfile::tempdir;

    fn outbox_in(dir: &tempfile::TempDir) -> SqliteOutbox {
        let config = StorageConfig {
            database_path: dir.path().join("outbox.db").to_str().unwrap().to_string(),
            wal_mode: true,
        };
        SqliteOutbox::new(config)
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let outbox = outbox_in(&dir);
        let err = outbox.outgoing_stats().await.unwrap_err();
        assert!(matches!(err, CourierError::Internal(_)));
    }

    #[tokio::test]
    async fn initialize_is_one_shot() {
        let dir = tempdir().unwrap();
        let outbox = outbox_in(&dir);
        outbox.initialize().await.unwrap();
        let err = outbox.initialize().await.unwrap_err();
        assert!(matches!(err, CourierError::Internal(_)));
        outbox.close().await.unwrap();
    }

    #[tokio::test]
    async fn full_lifecycle_through_the_trait() {
        let dir = tempdir().unwrap();
        let outbox = outbox_in(&dir);
        outbox.initialize().await.unwrap();

        let endpoint = Endpoint::new("10.0.0.1", 9999);
        let due = Utc::now() - Duration::seconds(1);
        outbox
            .enqueue(&endpoint, "orders", None, b"first", due)
            .await
            .unwrap();
        outbox
            .enqueue(&endpoint, "orders", None, b"second", due)
            .await
            .unwrap();

        let (batch, batch_endpoint) = outbox.select_batch(10, 1_000_000).await.unwrap();
        assert_eq!(batch_endpoint, Some(endpoint));
        assert_eq!(batch.len(), 2);

        outbox
            .mark_successfully_sent(&batch[0].bookmark)
            .await
            .unwrap();
        outbox
            .mark_failed_transmission(&batch[1].bookmark, false)
            .await
            .unwrap();

        let stats = outbox.outgoing_stats().await.unwrap();
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.history, 1);

        let archived = outbox.list_sent_history().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].status, OutgoingMessageStatus::Sent);
        outbox
            .revert_to_ready(&[archived[0].bookmark.clone()])
            .await
            .unwrap();
        assert_eq!(outbox.list_pending_outgoing().await.unwrap().len(), 2);

        outbox.close().await.unwrap();
    }
}
