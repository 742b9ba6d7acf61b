// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared column list for the two outgoing stores.
//!
//! `outgoing` and `outgoing_history` carry the same column set, and the
//! archive/revert paths copy rows wholesale between them. Generating that SQL
//! from one list keeps the copy statements from drifting out of step with the
//! schema in `migrations/V1__create_outgoing_stores.sql`.

/// Columns common to `outgoing` and `outgoing_history`, in schema order.
pub(crate) const SHARED_COLUMNS: &[&str] = &[
    "msg_id",
    "send_status",
    "time_to_send",
    "address",
    "port",
    "queue",
    "subqueue",
    "sent_at",
    "data",
    "number_of_retries",
];

/// SELECT list over the shared columns, used by every scan.
pub(crate) fn select_list() -> String {
    SHARED_COLUMNS.join(", ")
}

/// Copy a live row into history, forcing `send_status` to the bound value.
///
/// Binds: ?1 = status text, ?2 = msg_id of the live row. Inserts zero rows
/// when the live row is gone, which callers treat as a stale bookmark.
pub(crate) fn archive_sql() -> String {
    let projected: Vec<&str> = SHARED_COLUMNS
        .iter()
        .map(|col| if *col == "send_status" { "?1" } else { *col })
        .collect();
    format!(
        "INSERT INTO outgoing_history ({}) SELECT {} FROM outgoing WHERE msg_id = ?2",
        select_list(),
        projected.join(", "),
    )
}

/// Copy a history row back into the live store under a fresh identity.
///
/// Every column except `msg_id` is copied; `send_status` is forced to the
/// bound value. Binds: ?1 = status text, ?2 = history_id of the source row.
pub(crate) fn revert_sql() -> String {
    let copied: Vec<&str> = SHARED_COLUMNS
        .iter()
        .filter(|col| **col != "msg_id")
        .copied()
        .collect();
    let projected: Vec<&str> = copied
        .iter()
        .map(|col| if *col == "send_status" { "?1" } else { *col })
        .collect();
    format!(
        "INSERT INTO outgoing ({}) SELECT {} FROM outgoing_history WHERE history_id = ?2",
        copied.join(", "),
        projected.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_copies_every_shared_column() {
        let sql = archive_sql();
        for col in SHARED_COLUMNS {
            assert!(sql.contains(col), "archive SQL missing column {col}");
        }
        assert!(sql.contains("?1"), "status must be forced, not copied");
        assert!(!sql.contains("history_id"));
    }

    #[test]
    fn revert_never_copies_the_identity() {
        let sql = revert_sql();
        assert!(!sql.contains("msg_id"), "revert must mint a fresh msg_id");
        assert!(sql.contains("?1"));
        assert!(sql.contains("history_id"));
    }
}
