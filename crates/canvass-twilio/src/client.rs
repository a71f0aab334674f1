// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Twilio Messages API.
//!
//! Provides [`TwilioClient`] which handles request construction, basic-auth
//! credentials, and transient error retry.

use std::time::Duration;

use canvass_core::CanvassError;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageResponse};

/// Base URL for the Twilio REST API.
const API_BASE_URL: &str = "https://api.twilio.com";

/// HTTP client for Twilio API communication.
///
/// On transient errors (429, 500, 503), retries once after a 1-second delay.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    max_retries: u32,
    base_url: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String) -> Result<Self, CanvassError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CanvassError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            account_sid,
            auth_token,
            max_retries: 1,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends one SMS and returns the created message resource.
    pub async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<MessageResponse, CanvassError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let form = [("From", from), ("To", to), ("Body", body)];

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying SMS send after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .form(&form)
                .send()
                .await
                .map_err(|e| CanvassError::Transport {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, to, "Twilio response received");

            if status.is_success() {
                let text = response.text().await.map_err(|e| CanvassError::Transport {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let message: MessageResponse =
                    serde_json::from_str(&text).map_err(|e| CanvassError::Transport {
                        message: format!("failed to parse Twilio response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return Ok(message);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let text = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %text, "transient error, will retry");
                last_error = Some(CanvassError::Transport {
                    message: format!("Twilio returned {status}: {text}"),
                    source: None,
                });
                continue;
            }

            // Non-transient error or exhausted retries.
            let text = response.text().await.unwrap_or_default();
            let message = if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&text) {
                match api_err.code {
                    Some(code) => format!("Twilio error {code}: {}", api_err.message),
                    None => format!("Twilio error: {}", api_err.message),
                }
            } else {
                format!("Twilio returned {status}: {text}")
            };
            return Err(CanvassError::Transport {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| CanvassError::Transport {
            message: "SMS send failed after retries".into(),
            source: None,
        }))
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}
