// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Canvass outreach engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed query modules for
//! conversations, messages, campaigns, scenarios, follow-up state, and the
//! execution audit log.
//!
//! Conditional inserts (UNIQUE-guarded, reported as
//! [`queries::ConditionalInsert`]) are the storage primitive the engine's
//! race handling is built on: concurrent find-or-create converges on one
//! row instead of failing.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
pub use queries::ConditionalInsert;
