// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Canvass outreach engine.
//!
//! This crate provides the domain model, error type, gateway traits, and the
//! two pure functions every other crate leans on: phone canonicalization and
//! sentinel classification. It performs no I/O.

pub mod classify;
pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use classify::{classify_response, ResponseAction};
pub use error::CanvassError;
pub use traits::{
    Completion, CompletionGateway, CompletionTurn, MessagingGateway, SmsReceipt, TurnRole,
};
