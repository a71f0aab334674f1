// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API request/response types (non-streaming).

use serde::{Deserialize, Serialize};

/// A request to the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    /// Model identifier (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// Conversation messages, oldest first.
    pub messages: Vec<ApiMessage>,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A single message in the Anthropic conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Role: "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub model: String,
    pub content: Vec<ResponseContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: ApiUsage,
}

/// A content block in a response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Block types this integration does not use (tool_use etc.).
    #[serde(other)]
    Other,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Error envelope for non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
