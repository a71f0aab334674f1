// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway traits consumed by the engine and implemented by transport crates.

pub mod completion;
pub mod messaging;

pub use completion::{Completion, CompletionGateway, CompletionTurn, TurnRole};
pub use messaging::{MessagingGateway, SmsReceipt};
