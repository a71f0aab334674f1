// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio-backed [`MessagingGateway`] implementation.

pub mod client;
pub mod types;

use async_trait::async_trait;
use canvass_core::{CanvassError, MessagingGateway, SmsReceipt};
use tracing::info;

pub use client::TwilioClient;

/// [`MessagingGateway`] over the Twilio REST API.
pub struct TwilioGateway {
    client: TwilioClient,
}

impl TwilioGateway {
    pub fn new(account_sid: String, auth_token: String) -> Result<Self, CanvassError> {
        Ok(Self {
            client: TwilioClient::new(account_sid, auth_token)?,
        })
    }
}

#[async_trait]
impl MessagingGateway for TwilioGateway {
    async fn send_sms(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<SmsReceipt, CanvassError> {
        let message = self.client.send_message(from, to, body).await?;
        info!(sid = %message.sid, status = %message.status, to, "SMS accepted by Twilio");
        Ok(SmsReceipt {
            provider_message_id: message.sid,
        })
    }
}
