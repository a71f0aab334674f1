// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway trait for the text-completion model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CanvassError;

/// Role of one turn in the completion history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One role-tagged turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A successful generation with its usage metrics.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
    pub model: String,
    pub latency_ms: i64,
}

/// Generates one reply given a role-tagged history and system instructions.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Run one completion. Errors map to [`CanvassError::Provider`] and are
    /// terminal for the turn; no partial state is committed on failure.
    async fn generate(
        &self,
        system_instructions: &str,
        history: &[CompletionTurn],
    ) -> Result<Completion, CanvassError>;
}
