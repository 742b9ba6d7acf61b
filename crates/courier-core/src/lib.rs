// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types for the Courier outbound message queue.
//!
//! This crate defines the error taxonomy, the message model, the store
//! configuration, and the [`OutboxStore`] trait that persistence backends
//! implement. The SQLite backend lives in `courier-storage`.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::StorageConfig;
pub use error::CourierError;
pub use traits::OutboxStore;
pub use types::{
    BookmarkStore, Endpoint, MessageBookmark, MessageId, OutgoingMessageStatus, OutgoingStats,
    PersistentMessage, PersistentMessageToSend,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_error_has_all_variants() {
        let _stale = CourierError::StaleBookmark;
        let _storage = CourierError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _constraint = CourierError::ConstraintViolation("duplicate msg_id".into());
        let _config = CourierError::Config("test".into());
        let _internal = CourierError::Internal("test".into());
    }

    #[test]
    fn stale_bookmark_is_distinguishable() {
        // Callers branch on this variant to treat duplicate completions as
        // no-ops, so it must not collapse into the storage variant.
        let err = CourierError::StaleBookmark;
        assert!(matches!(err, CourierError::StaleBookmark));
        assert_eq!(
            err.to_string(),
            "stale bookmark: the referenced row no longer exists"
        );
    }
}
