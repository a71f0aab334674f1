// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock gateway implementations for deterministic testing.
//!
//! `MockMessaging` and `MockCompletion` implement the core gateway traits
//! with scripted behavior, enabling fast, CI-runnable tests without external
//! API calls.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use canvass_core::{
    CanvassError, Completion, CompletionGateway, CompletionTurn, MessagingGateway, SmsReceipt,
};

/// One SMS captured by [`MockMessaging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub from: String,
    pub to: String,
    pub body: String,
}

/// A mock SMS transport that records every send.
///
/// Specific recipient numbers can be marked as failing to exercise the
/// engine's per-recipient failure isolation.
#[derive(Default)]
pub struct MockMessaging {
    sent: Mutex<Vec<SentSms>>,
    failing_numbers: Mutex<HashSet<String>>,
}

impl MockMessaging {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every send to `number` fail with a transport error.
    pub async fn fail_for(&self, number: &str) {
        self.failing_numbers.lock().await.insert(number.to_string());
    }

    /// All messages accepted so far, in send order.
    pub async fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessagingGateway for MockMessaging {
    async fn send_sms(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<SmsReceipt, CanvassError> {
        if self.failing_numbers.lock().await.contains(to) {
            return Err(CanvassError::Transport {
                message: format!("mock transport rejected send to {to}"),
                source: None,
            });
        }
        self.sent.lock().await.push(SentSms {
            from: from.to_string(),
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(SmsReceipt {
            provider_message_id: format!("SM{}", uuid::Uuid::new_v4().simple()),
        })
    }
}

/// A mock completion model that returns pre-configured responses.
///
/// Responses are popped from a FIFO queue. When the queue is empty, a
/// default "mock reply" text is returned. `fail_next` turns the next call
/// into a provider error.
pub struct MockCompletion {
    responses: Mutex<VecDeque<String>>,
    fail_next: Mutex<bool>,
    /// System prompts the engine passed in, for prompt-assembly assertions.
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            fail_next: Mutex::new(false),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Create a mock pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            fail_next: Mutex::new(false),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Queue another scripted response.
    pub async fn add_response(&self, text: &str) {
        self.responses.lock().await.push_back(text.to_string());
    }

    /// Make the next `generate` call fail.
    pub async fn fail_next(&self) {
        *self.fail_next.lock().await = true;
    }

    /// System instruction strings observed so far.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl CompletionGateway for MockCompletion {
    async fn generate(
        &self,
        system_instructions: &str,
        _history: &[CompletionTurn],
    ) -> Result<Completion, CanvassError> {
        if std::mem::take(&mut *self.fail_next.lock().await) {
            return Err(CanvassError::Provider {
                message: "mock provider failure".to_string(),
                source: None,
            });
        }
        self.prompts
            .lock()
            .await
            .push(system_instructions.to_string());
        let text = self
            .responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock reply".to_string());
        Ok(Completion {
            text,
            tokens_used: 42,
            model: "mock-model".to_string(),
            latency_ms: 5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_messaging_records_sends_and_fails_on_request() {
        let messaging = MockMessaging::new();
        messaging.fail_for("+15550100999").await;

        messaging
            .send_sms("+15550100001", "+15550100100", "hello")
            .await
            .unwrap();
        let err = messaging
            .send_sms("+15550100001", "+15550100999", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, CanvassError::Transport { .. }));

        let sent = messaging.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "+15550100100");
    }

    #[tokio::test]
    async fn mock_completion_pops_scripted_responses_then_defaults() {
        let completion = MockCompletion::with_responses(vec!["first", "second"]);

        let a = completion.generate("sys", &[]).await.unwrap();
        let b = completion.generate("sys", &[]).await.unwrap();
        let c = completion.generate("sys", &[]).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert_eq!(c.text, "mock reply");
    }

    #[tokio::test]
    async fn mock_completion_fail_next_is_one_shot() {
        let completion = MockCompletion::new();
        completion.fail_next().await;

        assert!(completion.generate("sys", &[]).await.is_err());
        assert!(completion.generate("sys", &[]).await.is_ok());
    }
}
