// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listings over both outgoing stores, revert-to-ready, and stage counts.
//!
//! Listings are point-in-time snapshots taken under one read transaction;
//! they do not hold any cursor open after the call returns.

use std::str::FromStr;

use rusqlite::params;
use tracing::debug;

use courier_core::{
    BookmarkStore, CourierError, Endpoint, MessageBookmark, MessageId, OutgoingMessageStatus,
    OutgoingStats, PersistentMessageToSend,
};

use crate::columns;
use crate::database::{Database, column_conversion_err, map_tr_err, parse_timestamp};

/// Snapshot every live row, Ready and InFlight alike, in identity order.
pub async fn list_pending_outgoing(
    db: &Database,
) -> Result<Vec<PersistentMessageToSend>, CourierError> {
    let instance = db.instance_id();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {} FROM outgoing ORDER BY msg_id ASC",
                columns::select_list()
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut messages = Vec::new();
            while let Some(row) = rows.next()? {
                let msg_id: i64 = row.get(0)?;
                let status = OutgoingMessageStatus::from_str(&row.get::<_, String>(1)?)
                    .map_err(|e| column_conversion_err(1, e))?;
                messages.push(PersistentMessageToSend {
                    id: MessageId {
                        instance,
                        number: msg_id,
                    },
                    status,
                    endpoint: Endpoint::new(row.get::<_, String>(3)?, row.get::<_, u16>(4)?),
                    queue: row.get(5)?,
                    subqueue: row.get(6)?,
                    sent_at: parse_timestamp(&row.get::<_, String>(7)?)
                        .map_err(|e| column_conversion_err(7, e))?,
                    data: row.get(8)?,
                    bookmark: MessageBookmark::outgoing(msg_id),
                });
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Snapshot the archive, in the order rows entered it.
///
/// `id.number` keeps the message's original live-store number; the bookmark
/// addresses the history row itself, so it can feed [`revert_to_ready`].
pub async fn list_sent_history(
    db: &Database,
) -> Result<Vec<PersistentMessageToSend>, CourierError> {
    let instance = db.instance_id();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT history_id, {} FROM outgoing_history ORDER BY history_id ASC",
                columns::select_list()
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut messages = Vec::new();
            while let Some(row) = rows.next()? {
                let history_id: i64 = row.get(0)?;
                let msg_id: i64 = row.get(1)?;
                let status = OutgoingMessageStatus::from_str(&row.get::<_, String>(2)?)
                    .map_err(|e| column_conversion_err(2, e))?;
                messages.push(PersistentMessageToSend {
                    id: MessageId {
                        instance,
                        number: msg_id,
                    },
                    status,
                    endpoint: Endpoint::new(row.get::<_, String>(4)?, row.get::<_, u16>(5)?),
                    queue: row.get(6)?,
                    subqueue: row.get(7)?,
                    sent_at: parse_timestamp(&row.get::<_, String>(8)?)
                        .map_err(|e| column_conversion_err(8, e))?,
                    data: row.get(9)?,
                    bookmark: MessageBookmark::history(history_id),
                });
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Copy archived messages back into the live store as Ready rows.
///
/// Each reverted message is minted a fresh identity; dead numbers are never
/// reused. The source history rows are left in place for audit. The whole
/// call is one transaction: if any bookmark no longer resolves, nothing is
/// reverted and [`CourierError::StaleBookmark`] is returned.
pub async fn revert_to_ready(
    db: &Database,
    bookmarks: &[MessageBookmark],
) -> Result<(), CourierError> {
    for bookmark in bookmarks {
        if bookmark.store() != BookmarkStore::OutgoingHistory {
            return Err(CourierError::Internal(format!(
                "bookmark addresses {:?}, revert requires OutgoingHistory",
                bookmark.store()
            )));
        }
    }
    if bookmarks.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = bookmarks.iter().map(MessageBookmark::row_id).collect();
    let reverted = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let sql = columns::revert_sql();
            for &history_id in &ids {
                let inserted = tx.execute(
                    &sql,
                    params![OutgoingMessageStatus::Ready.to_string(), history_id],
                )?;
                if inserted == 0 {
                    // Dropping the transaction rolls back earlier reverts.
                    return Ok(false);
                }
                let new_msg_id = tx.last_insert_rowid();
                debug!(history_id, new_msg_id, "reverted archived message to ready");
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;
    if reverted {
        Ok(())
    } else {
        Err(CourierError::StaleBookmark)
    }
}

/// Count messages per lifecycle stage across both stores.
pub async fn outgoing_stats(db: &Database) -> Result<OutgoingStats, CourierError> {
    db.connection()
        .call(|conn| {
            let staged = |status: OutgoingMessageStatus| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM outgoing WHERE send_status = ?1",
                    [status.to_string()],
                    |row| row.get(0),
                )
            };
            let ready = staged(OutgoingMessageStatus::Ready)?;
            let in_flight = staged(OutgoingMessageStatus::InFlight)?;
            let history: i64 =
                conn.query_row("SELECT COUNT(*) FROM outgoing_history", [], |row| {
                    row.get(0)
                })?;
            Ok(OutgoingStats {
                ready: ready as usize,
                in_flight: in_flight as usize,
                history: history as usize,
            })
        })
        .await
        .map_err(map_tr_err)
}
