// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Twilio Messages API.

use serde::Deserialize;

/// Successful response from `POST /Accounts/{sid}/Messages.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    /// Twilio message SID, e.g. `SM...`.
    pub sid: String,
    pub status: String,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Error body Twilio returns on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}
