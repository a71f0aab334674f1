// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound SMS pipeline: persist, match, gate, respond.
//!
//! Every inbound message is recorded whatever happens next. After that the
//! pipeline decides whether an AI turn runs: stop keywords latch the
//! follow-up state and suppress it; a manual override suppresses it; an
//! unmatched number suppresses it. Only a clean match reaches the executor.

use std::sync::Arc;

use canvass_core::types::{
    ConversationPatch, Direction, InboundSms, Message, MessageStatus,
};
use canvass_core::CanvassError;
use canvass_storage::queries::{conversations, messages};
use canvass_storage::Database;
use tracing::{debug, info};

use crate::executor::{ExecutionOutcome, ScenarioExecutor};
use crate::followup::FollowupEngine;
use crate::matcher::ScenarioMatcher;
use crate::resolver::ConversationResolver;

/// Why the pipeline ended where it did.
#[derive(Debug)]
pub enum InboundDisposition {
    /// An AI turn ran; the executor's outcome is attached.
    Responded(ExecutionOutcome),
    /// A stop keyword latched the follow-up state; no turn ran.
    StopKeyword,
    /// The conversation is manually handled; no turn ran.
    ManualOverride,
    /// No scenario is assigned to the receiving number for this sender.
    NoScenario,
}

pub struct InboundProcessor {
    db: Arc<Database>,
    resolver: Arc<ConversationResolver>,
    matcher: Arc<ScenarioMatcher>,
    followups: Arc<FollowupEngine>,
    executor: Arc<ScenarioExecutor>,
}

impl InboundProcessor {
    pub fn new(
        db: Arc<Database>,
        resolver: Arc<ConversationResolver>,
        matcher: Arc<ScenarioMatcher>,
        followups: Arc<FollowupEngine>,
        executor: Arc<ScenarioExecutor>,
    ) -> Self {
        Self {
            db,
            resolver,
            matcher,
            followups,
            executor,
        }
    }

    /// Process one inbound SMS for `workspace_id`.
    pub async fn handle_inbound(
        &self,
        workspace_id: &str,
        sms: &InboundSms,
    ) -> Result<InboundDisposition, CanvassError> {
        // The external party is the conversation's recipient; our number is
        // its from_number.
        let conversation = self
            .resolver
            .resolve(workspace_id, &sms.from_number, &sms.to_number, "inbound")
            .await?;

        messages::insert(
            &self.db,
            &Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: conversation.id.clone(),
                direction: Direction::Inbound,
                from_number: conversation.phone_number.clone(),
                to_number: conversation.from_number.clone(),
                body: sms.body.clone(),
                provider_message_id: None,
                status: MessageStatus::Delivered,
                tokens_used: None,
                model: None,
                processing_ms: None,
                created_at: sms.received_at.clone(),
            },
        )
        .await?;
        conversations::update(
            &self.db,
            &conversation.id,
            &ConversationPatch {
                last_message_at: Some(sms.received_at.clone()),
                ..Default::default()
            },
        )
        .await?;

        let Some(scenario) = self
            .matcher
            .match_scenario(&sms.to_number, &sms.from_number)
            .await?
        else {
            debug!(to = %sms.to_number, "no scenario assigned, message recorded only");
            return Ok(InboundDisposition::NoScenario);
        };

        if FollowupEngine::stop_keyword_hit(&scenario, &sms.body) {
            info!(conversation_id = %conversation.id, "stop keyword received, follow-ups latched");
            self.followups.stop(&conversation.id, &scenario.id).await?;
            return Ok(InboundDisposition::StopKeyword);
        }

        if conversation.manual_override {
            debug!(conversation_id = %conversation.id, "manual override set, not responding");
            return Ok(InboundDisposition::ManualOverride);
        }

        let outcome = self
            .executor
            .execute(&scenario, &conversation, &sms.body, None)
            .await?;
        Ok(InboundDisposition::Responded(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_core::types::{now_rfc3339, ExecutionStatus, FollowupStage, Scenario, WaitUnit};
    use canvass_storage::queries::{executions, followups, scenarios};
    use canvass_test_utils::{MockCompletion, MockMessaging};
    use tempfile::tempdir;

    struct Harness {
        db: Arc<Database>,
        messaging: Arc<MockMessaging>,
        completion: Arc<MockCompletion>,
        processor: InboundProcessor,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = Arc::new(
            Database::open(dir.path().join("inbound.db").to_str().unwrap())
                .await
                .unwrap(),
        );
        let messaging = MockMessaging::new();
        let completion = MockCompletion::new();
        let resolver = Arc::new(ConversationResolver::new(db.clone()));
        let matcher = Arc::new(ScenarioMatcher::new(db.clone()));
        let followups = Arc::new(FollowupEngine::new(db.clone()));
        let executor = Arc::new(ScenarioExecutor::new(
            db.clone(),
            completion.clone(),
            messaging.clone(),
            followups.clone(),
        ));
        let processor =
            InboundProcessor::new(db.clone(), resolver, matcher, followups, executor);
        Harness {
            db,
            messaging,
            completion,
            processor,
            _dir: dir,
        }
    }

    const OWNED: &str = "+15550100001";
    const CUSTOMER: &str = "+15550100100";

    async fn seed_scenario(h: &Harness, id: &str) -> Scenario {
        let scenario = Scenario {
            id: id.to_string(),
            workspace_id: "ws-1".to_string(),
            name: id.to_string(),
            instructions: "Answer questions about the offer.".to_string(),
            active: true,
            max_followup_attempts: 5,
            business_hours: None,
            stop_keywords: None,
            created_at: now_rfc3339(),
        };
        scenarios::insert(&h.db, &scenario).await.unwrap();
        scenarios::assign_number(&h.db, id, OWNED).await.unwrap();
        scenarios::insert_stage(
            &h.db,
            &FollowupStage {
                scenario_id: id.to_string(),
                stage_number: 1,
                wait_duration: 2,
                wait_unit: WaitUnit::Days,
                instructions: None,
            },
        )
        .await
        .unwrap();
        scenario
    }

    fn sms(body: &str) -> InboundSms {
        InboundSms {
            from_number: CUSTOMER.to_string(),
            to_number: OWNED.to_string(),
            body: body.to_string(),
            received_at: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn matched_inbound_gets_a_reply_and_a_scheduled_followup() {
        let h = harness().await;
        let scenario = seed_scenario(&h, "sc-1").await;
        h.completion.add_response("Great question!").await;

        let disposition = h
            .processor
            .handle_inbound("ws-1", &sms("What does it cost?"))
            .await
            .unwrap();
        let InboundDisposition::Responded(outcome) = disposition else {
            panic!("expected a responded disposition");
        };
        assert_eq!(outcome.status, ExecutionStatus::Success);

        let sent = h.messaging.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, CUSTOMER);
        assert_eq!(sent[0].body, "Great question!");

        // Inbound turn: a follow-up at stage 1 was scheduled, not advanced.
        let conv = canvass_storage::queries::conversations::get_by_phone(&h.db, "ws-1", CUSTOMER)
            .await
            .unwrap()
            .unwrap();
        let state = followups::get_state(&h.db, &conv.id, &scenario.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_stage, 0);
        assert!(state.next_followup_at.is_some());
    }

    #[tokio::test]
    async fn stop_keyword_latches_and_suppresses_the_turn() {
        let h = harness().await;
        let scenario = seed_scenario(&h, "sc-1").await;

        // Establish a follow-up state first.
        h.completion.add_response("initial reply").await;
        h.processor
            .handle_inbound("ws-1", &sms("Tell me more"))
            .await
            .unwrap();

        let disposition = h
            .processor
            .handle_inbound("ws-1", &sms("STOP"))
            .await
            .unwrap();
        assert!(matches!(disposition, InboundDisposition::StopKeyword));

        // Only the initial reply went out.
        assert_eq!(h.messaging.sent().await.len(), 1);

        let conv = canvass_storage::queries::conversations::get_by_phone(&h.db, "ws-1", CUSTOMER)
            .await
            .unwrap()
            .unwrap();
        let state = followups::get_state(&h.db, &conv.id, &scenario.id)
            .await
            .unwrap()
            .unwrap();
        assert!(state.stopped);
        assert!(state.next_followup_at.is_none());

        // The STOP message itself is still on record.
        let history = messages::get_for_conversation(&h.db, &conv.id).await.unwrap();
        assert!(history.iter().any(|m| m.body == "STOP"));
    }

    #[tokio::test]
    async fn manual_override_records_but_does_not_respond() {
        let h = harness().await;
        seed_scenario(&h, "sc-1").await;

        // Pre-create the conversation with the override set.
        let resolver = ConversationResolver::new(h.db.clone());
        let conv = resolver
            .resolve("ws-1", CUSTOMER, OWNED, "user-1")
            .await
            .unwrap();
        conversations::update(
            &h.db,
            &conv.id,
            &ConversationPatch {
                manual_override: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let disposition = h
            .processor
            .handle_inbound("ws-1", &sms("hello?"))
            .await
            .unwrap();
        assert!(matches!(disposition, InboundDisposition::ManualOverride));
        assert!(h.messaging.sent().await.is_empty());
        assert!(h.completion.prompts().await.is_empty());

        let history = messages::get_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn unmatched_number_records_only() {
        let h = harness().await;
        // No scenario assigned to OWNED at all.
        let disposition = h
            .processor
            .handle_inbound("ws-1", &sms("anyone there?"))
            .await
            .unwrap();
        assert!(matches!(disposition, InboundDisposition::NoScenario));
        assert!(h.messaging.sent().await.is_empty());

        let conv = canvass_storage::queries::conversations::get_by_phone(&h.db, "ws-1", CUSTOMER)
            .await
            .unwrap()
            .unwrap();
        let history = messages::get_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(executions::list_for_conversation(&h.db, &conv.id)
            .await
            .unwrap()
            .is_empty());
    }
}
