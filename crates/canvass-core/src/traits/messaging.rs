// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway trait for the SMS transport.

use async_trait::async_trait;

use crate::error::CanvassError;

/// Provider acknowledgement for an accepted send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    /// Provider-assigned message id, stored on the outbound message row.
    pub provider_message_id: String,
}

/// Sends a single SMS and normalizes provider-specific errors.
///
/// The engine depends only on this contract; the concrete transport is
/// injected at construction so tests can substitute fakes and multiple
/// credential sets can coexist in one process.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send one SMS from an owned number to an external number.
    ///
    /// Errors map to [`CanvassError::Transport`]. A timeout is this call's
    /// failure branch; the engine never retries inside a turn.
    async fn send_sms(&self, from: &str, to: &str, body: &str)
    -> Result<SmsReceipt, CanvassError>;
}
