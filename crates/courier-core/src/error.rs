// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier outbound message queue.

use thiserror::Error;

/// The primary error type used across Courier store operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// A bookmark no longer resolves to a row. The message it referenced was
    /// already moved or deleted, usually by a completion call that raced this
    /// one. Callers should treat this as "already handled" rather than retry.
    #[error("stale bookmark: the referenced row no longer exists")]
    StaleBookmark,

    /// Storage engine errors (connection, query failure, corruption).
    /// Not recoverable locally; the enclosing transaction has been rolled back.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An insert hit a duplicate or invalid key. This indicates a logic bug
    /// (e.g. a reused message id) and should never be silently retried.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Configuration errors (invalid values, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors, including misuse of the API such as
    /// passing a bookmark captured against the wrong store.
    #[error("internal error: {0}")]
    Internal(String),
}
