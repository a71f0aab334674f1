// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic-backed [`CompletionGateway`] implementation.

pub mod client;
pub mod types;

use std::time::Instant;

use async_trait::async_trait;
use canvass_core::{
    CanvassError, Completion, CompletionGateway, CompletionTurn, TurnRole,
};
use tracing::debug;

pub use client::AnthropicClient;

use crate::types::{ApiMessage, MessageRequest, ResponseContentBlock};

/// [`CompletionGateway`] over the Anthropic Messages API.
pub struct AnthropicGateway {
    client: AnthropicClient,
}

impl AnthropicGateway {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionGateway for AnthropicGateway {
    async fn generate(
        &self,
        system_instructions: &str,
        history: &[CompletionTurn],
    ) -> Result<Completion, CanvassError> {
        let (system, messages) = fold_leading_assistant(system_instructions, history);
        if messages.is_empty() {
            return Err(CanvassError::Validation(
                "conversation history contains no user turn".to_string(),
            ));
        }
        let request = MessageRequest {
            model: self.client.default_model().to_string(),
            messages,
            system: Some(system),
            max_tokens: self.client.max_tokens(),
        };

        let started = Instant::now();
        let response = self.client.complete_message(&request).await?;
        let latency_ms = started.elapsed().as_millis() as i64;

        let text: String = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect();
        if text.is_empty() {
            return Err(CanvassError::Provider {
                message: "completion contained no text content".to_string(),
                source: None,
            });
        }
        debug!(
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            latency_ms,
            "completion generated"
        );

        Ok(Completion {
            text,
            tokens_used: response.usage.input_tokens + response.usage.output_tokens,
            model: response.model,
            latency_ms,
        })
    }
}

/// Shape a turn history for the Messages API, which requires the first
/// message to carry the `user` role. A conversation opened by an outbound
/// campaign send starts with assistant turns; those are folded into the
/// system prompt so the request stays valid without losing context.
fn fold_leading_assistant(
    system_instructions: &str,
    history: &[CompletionTurn],
) -> (String, Vec<ApiMessage>) {
    let lead = history
        .iter()
        .take_while(|turn| turn.role == TurnRole::Assistant)
        .count();

    let mut system = system_instructions.to_string();
    if lead > 0 {
        system.push_str("\n\nYou already sent the following to open this conversation:");
        for turn in &history[..lead] {
            system.push('\n');
            system.push_str(&turn.content);
        }
    }

    let messages = history[lead..]
        .iter()
        .map(|turn| ApiMessage {
            role: match turn.role {
                TurnRole::User => "user".to_string(),
                TurnRole::Assistant => "assistant".to_string(),
            },
            content: turn.content.clone(),
        })
        .collect();
    (system, messages)
}
