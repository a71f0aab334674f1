// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! Provides [`AnthropicClient`] which handles request construction,
//! authentication headers, and transient error retry. Streaming is not used;
//! SMS replies are short and a single round trip is simpler to audit.

use std::time::Duration;

use canvass_core::CanvassError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

/// Base URL for the Anthropic Messages API.
const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// HTTP client for Anthropic API communication.
///
/// On transient errors (429, 500, 503, 529), retries once after a 1-second
/// delay.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    default_model: String,
    max_tokens: u32,
    max_retries: u32,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        api_version: String,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, CanvassError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key)
                .map_err(|e| CanvassError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&api_version).map_err(|e| {
                CanvassError::Config(format!("invalid API version header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CanvassError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            default_model: model,
            max_tokens,
            max_retries: 1,
            base_url: API_BASE_URL.to_string(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a non-streaming request and returns the full response.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, CanvassError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(request)
                .send()
                .await
                .map_err(|e| CanvassError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "completion response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| CanvassError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let msg: MessageResponse =
                    serde_json::from_str(&body).map_err(|e| CanvassError::Provider {
                        message: format!("failed to parse API response: {e}"),
                        source: Some(Box::new(e)),
                    })?;
                return Ok(msg);
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(CanvassError::Provider {
                    message: format!("API returned {status}: {body}"),
                    source: None,
                });
                continue;
            }

            // Non-transient error or exhausted retries.
            let body = response.text().await.unwrap_or_default();
            let message = if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                format!(
                    "Anthropic API error ({}): {}",
                    api_err.error.type_, api_err.error.message
                )
            } else {
                format!("API returned {status}: {body}")
            };
            return Err(CanvassError::Provider {
                message,
                source: None,
            });
        }

        Err(last_error.unwrap_or_else(|| CanvassError::Provider {
            message: "completion request failed after retries".into(),
            source: None,
        }))
    }
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}
