// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch selection and completion transitions for the live outgoing store.
//!
//! The sender loop calls [`select_batch`] to claim a bounded, single-endpoint
//! batch, attempts delivery over its own transport, then reports exactly one
//! outcome per message via [`mark_successfully_sent`] or
//! [`mark_failed_transmission`]. Every operation here is one SQLite
//! transaction, so the archive-then-delete moves are all-or-nothing.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use tracing::{debug, info, warn};

use courier_core::{
    BookmarkStore, CourierError, Endpoint, MessageBookmark, MessageId, OutgoingMessageStatus,
    PersistentMessage,
};

use crate::columns;
use crate::database::{
    Database, column_conversion_err, format_timestamp, map_tr_err, parse_timestamp,
};

/// Failed-transmission budget. Once a message has been retried this many
/// times it is archived as a permanent failure instead of requeued.
pub const MAX_TRANSMISSION_RETRIES: u32 = 100;

/// Insert a new live message with status Ready and a retry count of zero.
///
/// `time_to_send` is the earliest moment the message becomes eligible for
/// selection; pass the current time for immediate delivery.
pub async fn enqueue(
    db: &Database,
    endpoint: &Endpoint,
    queue: &str,
    subqueue: Option<&str>,
    data: &[u8],
    time_to_send: DateTime<Utc>,
) -> Result<MessageId, CourierError> {
    let instance = db.instance_id();
    let endpoint = endpoint.clone();
    let queue = queue.to_string();
    let subqueue = subqueue.map(str::to_string);
    let data = data.to_vec();
    let number = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO outgoing
                     (send_status, time_to_send, address, port, queue, subqueue, sent_at, data, number_of_retries)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
                params![
                    OutgoingMessageStatus::Ready.to_string(),
                    format_timestamp(time_to_send),
                    endpoint.address,
                    endpoint.port,
                    queue,
                    subqueue,
                    format_timestamp(Utc::now()),
                    data,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)?;
    debug!(msg_id = number, "enqueued outgoing message");
    Ok(MessageId {
        instance,
        number,
    })
}

/// Select a batch of due, ready messages for one endpoint and mark them
/// in-flight in the same transaction.
///
/// The live store is scanned from the start in row order; it is not assumed
/// to be sorted by destination or due time. The endpoint of the first
/// eligible row fixes the batch destination, and rows for other endpoints
/// are left Ready for a later call. Both caps are checked after each
/// addition, so the batch can exceed either bound by at most one message --
/// messages are never split. Returns `(vec![], None)` when nothing is due.
///
/// A selected message is not offered again until its outcome is reported
/// through one of the completion transitions.
pub async fn select_batch(
    db: &Database,
    max_count: usize,
    max_total_bytes: usize,
) -> Result<(Vec<PersistentMessage>, Option<Endpoint>), CourierError> {
    select_batch_at(db, max_count, max_total_bytes, Utc::now()).await
}

pub(crate) async fn select_batch_at(
    db: &Database,
    max_count: usize,
    max_total_bytes: usize,
    now: DateTime<Utc>,
) -> Result<(Vec<PersistentMessage>, Option<Endpoint>), CourierError> {
    let instance = db.instance_id();
    let now_text = format_timestamp(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut messages: Vec<PersistentMessage> = Vec::new();
            let mut batch_endpoint: Option<Endpoint> = None;
            let mut total_bytes = 0usize;
            {
                let sql = format!(
                    "SELECT {} FROM outgoing ORDER BY msg_id ASC",
                    columns::select_list()
                );
                let mut stmt = tx.prepare(&sql)?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let msg_id: i64 = row.get(0)?;
                    let status_text: String = row.get(1)?;
                    let status = OutgoingMessageStatus::from_str(&status_text)
                        .map_err(|e| column_conversion_err(1, e))?;
                    let time_to_send: String = row.get(2)?;
                    debug!(msg_id, status = %status_text, due = %time_to_send, "scanning outgoing message");

                    if status != OutgoingMessageStatus::Ready {
                        continue;
                    }
                    if time_to_send.as_str() > now_text.as_str() {
                        continue;
                    }

                    let row_endpoint =
                        Endpoint::new(row.get::<_, String>(3)?, row.get::<_, u16>(4)?);
                    match &batch_endpoint {
                        None => batch_endpoint = Some(row_endpoint),
                        Some(endpoint) if *endpoint != row_endpoint => continue,
                        Some(_) => {}
                    }

                    let sent_at = parse_timestamp(&row.get::<_, String>(7)?)
                        .map_err(|e| column_conversion_err(7, e))?;
                    let data: Vec<u8> = row.get(8)?;
                    total_bytes += data.len();
                    messages.push(PersistentMessage {
                        id: MessageId {
                            instance,
                            number: msg_id,
                        },
                        queue: row.get(5)?,
                        subqueue: row.get(6)?,
                        sent_at,
                        data,
                        bookmark: MessageBookmark::outgoing(msg_id),
                    });

                    // Caps are checked after the addition, so the batch may
                    // overshoot either bound by exactly one message.
                    if messages.len() > max_count {
                        break;
                    }
                    if total_bytes > max_total_bytes {
                        break;
                    }
                }
            }
            for message in &messages {
                tx.execute(
                    "UPDATE outgoing SET send_status = ?1 WHERE msg_id = ?2",
                    params![
                        OutgoingMessageStatus::InFlight.to_string(),
                        message.bookmark.row_id()
                    ],
                )?;
                debug!(
                    msg_id = message.bookmark.row_id(),
                    "marked outgoing message in-flight"
                );
            }
            tx.commit()?;
            Ok((messages, batch_endpoint))
        })
        .await
        .map_err(map_tr_err)
}

/// Report a failed transmission for the message behind `bookmark`.
///
/// While the retry budget lasts and the destination queue exists, the row is
/// requeued in place: status back to Ready, retry count incremented, and the
/// due time pushed out by the square of the new retry count in seconds.
/// Otherwise the row is archived to history (status forced to Sent, marking
/// "no longer being retried" rather than "delivered") and deleted from the
/// live store. Either way the in-flight claim is resolved.
///
/// Fails with [`CourierError::StaleBookmark`] when the row is already gone,
/// which callers must treat as "someone else resolved it", not retry.
pub async fn mark_failed_transmission(
    db: &Database,
    bookmark: &MessageBookmark,
    destination_queue_missing: bool,
) -> Result<(), CourierError> {
    mark_failed_transmission_at(db, bookmark, destination_queue_missing, Utc::now()).await
}

pub(crate) async fn mark_failed_transmission_at(
    db: &Database,
    bookmark: &MessageBookmark,
    destination_queue_missing: bool,
    now: DateTime<Utc>,
) -> Result<(), CourierError> {
    require_store(bookmark, BookmarkStore::Outgoing)?;
    let msg_id = bookmark.row_id();
    let resolved = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let retries = match tx.query_row(
                "SELECT number_of_retries FROM outgoing WHERE msg_id = ?1",
                [msg_id],
                |row| row.get::<_, u32>(0),
            ) {
                Ok(n) => n,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
                Err(e) => return Err(e.into()),
            };

            if retries < MAX_TRANSMISSION_RETRIES && !destination_queue_missing {
                let new_retries = retries + 1;
                let delay = Duration::seconds(i64::from(new_retries) * i64::from(new_retries));
                tx.execute(
                    "UPDATE outgoing SET send_status = ?1, time_to_send = ?2, number_of_retries = ?3
                     WHERE msg_id = ?4",
                    params![
                        OutgoingMessageStatus::Ready.to_string(),
                        format_timestamp(now + delay),
                        new_retries,
                        msg_id
                    ],
                )?;
                debug!(msg_id, retries = new_retries, "requeued failed message with backoff");
            } else {
                tx.execute(
                    &columns::archive_sql(),
                    params![OutgoingMessageStatus::Sent.to_string(), msg_id],
                )?;
                tx.execute("DELETE FROM outgoing WHERE msg_id = ?1", [msg_id])?;
                warn!(
                    msg_id,
                    retries,
                    destination_queue_missing,
                    "message permanently failed, archived to history"
                );
            }
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;
    if resolved {
        Ok(())
    } else {
        Err(CourierError::StaleBookmark)
    }
}

/// Report a successful transmission: archive the message to history with
/// status Sent and delete the live row, as one transaction.
///
/// Returns a bookmark to the newly inserted history row so callers can
/// reference the archived copy (e.g. for batched acknowledgment). Fails with
/// [`CourierError::StaleBookmark`] when the live row is already gone.
pub async fn mark_successfully_sent(
    db: &Database,
    bookmark: &MessageBookmark,
) -> Result<MessageBookmark, CourierError> {
    require_store(bookmark, BookmarkStore::Outgoing)?;
    let msg_id = bookmark.row_id();
    let history_row = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                &columns::archive_sql(),
                params![OutgoingMessageStatus::Sent.to_string(), msg_id],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            let history_row = tx.last_insert_rowid();
            tx.execute("DELETE FROM outgoing WHERE msg_id = ?1", [msg_id])?;
            tx.commit()?;
            info!(msg_id, "successfully sent outgoing message");
            Ok(Some(history_row))
        })
        .await
        .map_err(map_tr_err)?;
    history_row
        .map(MessageBookmark::history)
        .ok_or(CourierError::StaleBookmark)
}

/// A bookmark captured against one store can never address the other; mixing
/// them up is a caller bug, surfaced loudly rather than coerced.
fn require_store(bookmark: &MessageBookmark, expected: BookmarkStore) -> Result<(), CourierError> {
    if bookmark.store() == expected {
        Ok(())
    } else {
        Err(CourierError::Internal(format!(
            "bookmark addresses {:?}, operation requires {:?}",
            bookmark.store(),
            expected
        )))
    }
}
