// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL query modules, one per concern.

pub mod history;
pub mod outgoing;
