// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Courier outbound message queue.
//!
//! Two stores back the sender side: `outgoing` holds live messages moving
//! through ready → in-flight, and `outgoing_history` archives everything that
//! left the live store. All access goes through a single background writer
//! connection; [`adapter::SqliteOutbox`] exposes the stores behind the
//! [`courier_core::OutboxStore`] trait.

pub mod adapter;
mod columns;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteOutbox;
pub use database::Database;
