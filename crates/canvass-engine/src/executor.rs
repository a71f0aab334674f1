// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs one AI turn for a conversation: gate, context, generation, sentinel
//! interpretation, dispatch, commit.
//!
//! Audit invariant: every call writes exactly one `scenario_executions` row
//! before returning, whatever the outcome. One AI-turn attempt, one log row.

use std::sync::Arc;

use canvass_core::classify::{classify_response, ResponseAction};
use canvass_core::types::{
    now_rfc3339, Conversation, ConversationPatch, Direction, ExecutionStatus, Message,
    MessageStatus, Scenario, ScenarioExecution,
};
use canvass_core::{CanvassError, CompletionGateway, CompletionTurn, MessagingGateway, TurnRole};
use canvass_storage::queries::{conversations, executions, messages};
use canvass_storage::Database;
use tracing::{debug, info, warn};

use crate::followup::{FollowupEngine, TurnActor};

/// Rule block appended to every scenario's instructions, defining the
/// control sentinels the classifier looks for.
pub const SENTINEL_RULES: &str = "\
Control rules:\n\
- If the customer asks you to stop contacting them, or continuing the \
conversation serves no purpose, respond with exactly: STOP_SCENARIO\n\
- If the request requires a person (pricing exceptions, complaints, \
anything you cannot resolve), respond with exactly: NEED_HUMAN";

/// Fixed transitional message sent to the customer on hand-off.
pub const HANDOFF_MESSAGE: &str =
    "Thanks for reaching out! A member of our team will get back to you shortly.";

/// Label applied to conversations the model handed off.
pub const NEED_HUMAN_LABEL: &str = "Need human";

/// Stage context for scheduler-triggered turns.
#[derive(Debug, Clone)]
pub struct FollowupContext {
    /// The stage that fired (current_stage + 1 at scheduling time).
    pub stage_number: u32,
    /// Stage-specific instructions appended to the scenario's base prompt.
    pub instructions: Option<String>,
}

/// Result of one executor call.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    /// The model asked to cease responding.
    pub stopped: bool,
    /// The model handed off to a person.
    pub human_needed: bool,
    /// Id of the outbound message row, when a reply was sent.
    pub reply_message_id: Option<String>,
}

impl ExecutionOutcome {
    fn of(status: ExecutionStatus) -> Self {
        Self {
            status,
            stopped: false,
            human_needed: false,
            reply_message_id: None,
        }
    }
}

/// Executes one AI turn end to end. Single pass, no internal retry: a
/// completion or transport failure abandons the turn and nothing partial is
/// committed.
pub struct ScenarioExecutor {
    db: Arc<Database>,
    completion: Arc<dyn CompletionGateway>,
    messaging: Arc<dyn MessagingGateway>,
    followups: Arc<FollowupEngine>,
}

impl ScenarioExecutor {
    pub fn new(
        db: Arc<Database>,
        completion: Arc<dyn CompletionGateway>,
        messaging: Arc<dyn MessagingGateway>,
        followups: Arc<FollowupEngine>,
    ) -> Self {
        Self {
            db,
            completion,
            messaging,
            followups,
        }
    }

    /// Run one AI turn for `conversation` under `scenario`.
    ///
    /// `trigger_body` is the inbound text that prompted the turn (or the
    /// last inbound body for a scheduled follow-up). `followup` carries the
    /// firing stage for scheduler-triggered turns and is `None` for inbound
    /// replies.
    pub async fn execute(
        &self,
        scenario: &Scenario,
        conversation: &Conversation,
        trigger_body: &str,
        followup: Option<&FollowupContext>,
    ) -> Result<ExecutionOutcome, CanvassError> {
        // 1. Business-hours gate. Skips before any generation or send, and
        //    schedules nothing.
        if !FollowupEngine::is_within_business_hours(scenario, chrono::Utc::now()) {
            debug!(scenario_id = %scenario.id, "outside business hours, skipping turn");
            self.log(
                scenario,
                conversation,
                trigger_body,
                String::new(),
                LogDetails {
                    status: ExecutionStatus::SkippedBusinessHours,
                    ..Default::default()
                },
            )
            .await?;
            return Ok(ExecutionOutcome::of(ExecutionStatus::SkippedBusinessHours));
        }

        // 2. Context: full history, oldest first, role-tagged.
        let history = messages::get_for_conversation(&self.db, &conversation.id).await?;
        let mut turns: Vec<CompletionTurn> = history
            .iter()
            .map(|m| CompletionTurn {
                role: match m.direction {
                    Direction::Inbound => TurnRole::User,
                    Direction::Outbound => TurnRole::Assistant,
                },
                content: m.body.clone(),
            })
            .collect();
        if turns.is_empty() {
            turns.push(CompletionTurn {
                role: TurnRole::User,
                content: trigger_body.to_string(),
            });
        }

        // 3. Prompt assembly: base instructions, stage suffix, sentinel rules.
        let mut prompt = scenario.instructions.clone();
        if let Some(stage_instructions) = followup.and_then(|f| f.instructions.as_deref()) {
            prompt.push_str("\n\n");
            prompt.push_str(stage_instructions);
        }
        prompt.push_str("\n\n");
        prompt.push_str(SENTINEL_RULES);

        // 4. Generation. Failure is terminal for this turn.
        let completion = match self.completion.generate(&prompt, &turns).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(scenario_id = %scenario.id, error = %e, "completion failed");
                self.log(
                    scenario,
                    conversation,
                    trigger_body,
                    prompt,
                    LogDetails {
                        status: ExecutionStatus::Failed,
                        error: Some(e.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
                return Err(e);
            }
        };

        // 5. Sentinel interpretation.
        match classify_response(&completion.text) {
            ResponseAction::Stop => {
                info!(conversation_id = %conversation.id, "model requested stop, no reply sent");
                self.followups.stop(&conversation.id, &scenario.id).await?;
                self.log(
                    scenario,
                    conversation,
                    trigger_body,
                    prompt,
                    LogDetails {
                        status: ExecutionStatus::NoReply,
                        response: Some(completion.text),
                        tokens: Some(completion.tokens_used),
                        model: Some(completion.model),
                        latency_ms: Some(completion.latency_ms),
                        ..Default::default()
                    },
                )
                .await?;
                Ok(ExecutionOutcome {
                    stopped: true,
                    ..ExecutionOutcome::of(ExecutionStatus::NoReply)
                })
            }
            ResponseAction::NeedHuman => {
                info!(conversation_id = %conversation.id, "model handed off to a human");
                self.followups
                    .add_label(&conversation.id, NEED_HUMAN_LABEL)
                    .await?;
                // Latches every follow-up state for the conversation too.
                self.followups
                    .set_manual_override(&conversation.id, true)
                    .await?;

                if let Err(e) = self.send_reply(conversation, HANDOFF_MESSAGE, None).await {
                    self.log(
                        scenario,
                        conversation,
                        trigger_body,
                        prompt,
                        LogDetails {
                            status: ExecutionStatus::Failed,
                            response: Some(completion.text),
                            error: Some(e.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                    return Err(e);
                }

                self.log(
                    scenario,
                    conversation,
                    trigger_body,
                    prompt,
                    LogDetails {
                        status: ExecutionStatus::HumanNeeded,
                        response: Some(completion.text),
                        tokens: Some(completion.tokens_used),
                        model: Some(completion.model),
                        latency_ms: Some(completion.latency_ms),
                        ..Default::default()
                    },
                )
                .await?;
                Ok(ExecutionOutcome {
                    human_needed: true,
                    ..ExecutionOutcome::of(ExecutionStatus::HumanNeeded)
                })
            }
            ResponseAction::Reply(text) => {
                // 6. Reply dispatch. Send failure abandons the turn.
                let message_id = match self
                    .send_reply(conversation, &text, Some(&completion))
                    .await
                {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(conversation_id = %conversation.id, error = %e, "reply send failed");
                        self.log(
                            scenario,
                            conversation,
                            trigger_body,
                            prompt,
                            LogDetails {
                                status: ExecutionStatus::Failed,
                                response: Some(text),
                                error: Some(e.to_string()),
                                ..Default::default()
                            },
                        )
                        .await?;
                        return Err(e);
                    }
                };

                // 7. Commit: log, then advance the follow-up state machine.
                self.log(
                    scenario,
                    conversation,
                    trigger_body,
                    prompt,
                    LogDetails {
                        status: ExecutionStatus::Success,
                        response: Some(text),
                        tokens: Some(completion.tokens_used),
                        model: Some(completion.model.clone()),
                        latency_ms: Some(completion.latency_ms),
                        ..Default::default()
                    },
                )
                .await?;

                self.followups
                    .record_turn(&conversation.id, &scenario.id, TurnActor::Ai)
                    .await?;
                if followup.is_some() {
                    self.followups
                        .advance_stage(&conversation.id, &scenario.id)
                        .await?;
                }
                self.followups
                    .schedule_next(&conversation.id, scenario)
                    .await?;

                Ok(ExecutionOutcome {
                    reply_message_id: Some(message_id),
                    ..ExecutionOutcome::of(ExecutionStatus::Success)
                })
            }
        }
    }

    /// Send one outbound SMS and record it as a message row.
    async fn send_reply(
        &self,
        conversation: &Conversation,
        body: &str,
        completion: Option<&canvass_core::Completion>,
    ) -> Result<String, CanvassError> {
        let receipt = self
            .messaging
            .send_sms(&conversation.from_number, &conversation.phone_number, body)
            .await?;

        let now = now_rfc3339();
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            direction: Direction::Outbound,
            from_number: conversation.from_number.clone(),
            to_number: conversation.phone_number.clone(),
            body: body.to_string(),
            provider_message_id: Some(receipt.provider_message_id),
            status: MessageStatus::Sent,
            tokens_used: completion.map(|c| c.tokens_used),
            model: completion.map(|c| c.model.clone()),
            processing_ms: completion.map(|c| c.latency_ms),
            created_at: now.clone(),
        };
        messages::insert(&self.db, &message).await?;
        conversations::update(
            &self.db,
            &conversation.id,
            &ConversationPatch {
                last_message_at: Some(now),
                ..Default::default()
            },
        )
        .await?;
        Ok(message.id)
    }

    async fn log(
        &self,
        scenario: &Scenario,
        conversation: &Conversation,
        trigger_body: &str,
        prompt: String,
        details: LogDetails,
    ) -> Result<(), CanvassError> {
        executions::insert(
            &self.db,
            &ScenarioExecution {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: conversation.id.clone(),
                scenario_id: scenario.id.clone(),
                trigger_body: trigger_body.to_string(),
                prompt,
                response: details.response,
                tokens_used: details.tokens,
                model: details.model,
                processing_ms: details.latency_ms,
                execution_status: details.status,
                error_message: details.error,
                created_at: now_rfc3339(),
            },
        )
        .await
    }
}

#[derive(Default)]
struct LogDetails {
    status: ExecutionStatus,
    response: Option<String>,
    tokens: Option<u32>,
    model: Option<String>,
    latency_ms: Option<i64>,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_core::types::{BusinessHours, ConversationStatus};
    use canvass_storage::queries::{executions, followups, scenarios};
    use canvass_test_utils::{MockCompletion, MockMessaging};
    use tempfile::tempdir;

    struct Harness {
        db: Arc<Database>,
        messaging: Arc<MockMessaging>,
        completion: Arc<MockCompletion>,
        executor: ScenarioExecutor,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = Arc::new(
            Database::open(dir.path().join("executor.db").to_str().unwrap())
                .await
                .unwrap(),
        );
        let messaging = MockMessaging::new();
        let completion = MockCompletion::new();
        let followups = Arc::new(FollowupEngine::new(db.clone()));
        let executor = ScenarioExecutor::new(
            db.clone(),
            completion.clone(),
            messaging.clone(),
            followups,
        );
        Harness {
            db,
            messaging,
            completion,
            executor,
            _dir: dir,
        }
    }

    fn make_scenario(id: &str) -> Scenario {
        Scenario {
            id: id.to_string(),
            workspace_id: "ws-1".to_string(),
            name: id.to_string(),
            instructions: "You are a helpful assistant.".to_string(),
            active: true,
            max_followup_attempts: 5,
            business_hours: None,
            stop_keywords: None,
            created_at: now_rfc3339(),
        }
    }

    fn make_conversation() -> Conversation {
        Conversation {
            id: "conv-1".to_string(),
            workspace_id: "ws-1".to_string(),
            phone_number: "+15550100100".to_string(),
            from_number: "+15550100001".to_string(),
            display_name: None,
            last_message_at: None,
            status: ConversationStatus::Open,
            pinned: false,
            labels: Vec::new(),
            manual_override: false,
            created_by: "user-1".to_string(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    async fn seed(h: &Harness, scenario: &Scenario) -> Conversation {
        scenarios::insert(&h.db, scenario).await.unwrap();
        let conv = make_conversation();
        canvass_storage::queries::conversations::insert(&h.db, &conv)
            .await
            .unwrap();
        let inbound = Message {
            id: "m-in".to_string(),
            conversation_id: conv.id.clone(),
            direction: Direction::Inbound,
            from_number: conv.phone_number.clone(),
            to_number: conv.from_number.clone(),
            body: "Tell me more".to_string(),
            provider_message_id: None,
            status: MessageStatus::Delivered,
            tokens_used: None,
            model: None,
            processing_ms: None,
            created_at: now_rfc3339(),
        };
        messages::insert(&h.db, &inbound).await.unwrap();
        conv
    }

    #[tokio::test]
    async fn plain_reply_sends_and_commits() {
        let h = harness().await;
        let scenario = make_scenario("sc-1");
        let conv = seed(&h, &scenario).await;
        h.completion.add_response("Happy to help!").await;

        let outcome = h
            .executor
            .execute(&scenario, &conv, "Tell me more", None)
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert!(outcome.reply_message_id.is_some());

        let sent = h.messaging.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "+15550100100");
        assert_eq!(sent[0].body, "Happy to help!");

        // The outbound message carries the AI metadata.
        let history = messages::get_for_conversation(&h.db, &conv.id).await.unwrap();
        let reply = history.last().unwrap();
        assert_eq!(reply.direction, Direction::Outbound);
        assert_eq!(reply.tokens_used, Some(42));
        assert_eq!(reply.model.as_deref(), Some("mock-model"));

        // Commit created the follow-up state at stage 0.
        let state = followups::get_state(&h.db, &conv.id, &scenario.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_stage, 0);

        let log = executions::list_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].execution_status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn stop_sentinel_never_sends() {
        let h = harness().await;
        let scenario = make_scenario("sc-1");
        let conv = seed(&h, &scenario).await;
        h.completion
            .add_response("I understand. STOP_SCENARIO")
            .await;

        let outcome = h
            .executor
            .execute(&scenario, &conv, "stop it", None)
            .await
            .unwrap();
        assert!(outcome.stopped);
        assert_eq!(outcome.status, ExecutionStatus::NoReply);
        assert!(h.messaging.sent().await.is_empty(), "no outbound SMS on stop");

        let log = executions::list_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].execution_status, ExecutionStatus::NoReply);
    }

    #[tokio::test]
    async fn need_human_labels_latches_and_sends_handoff() {
        let h = harness().await;
        let scenario = make_scenario("sc-1");
        let conv = seed(&h, &scenario).await;
        h.completion.add_response("NEED_HUMAN").await;

        let outcome = h
            .executor
            .execute(&scenario, &conv, "complaint", None)
            .await
            .unwrap();
        assert!(outcome.human_needed);

        let stored = canvass_storage::queries::conversations::get_by_id(&h.db, &conv.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.manual_override);
        assert!(stored.labels.contains(&NEED_HUMAN_LABEL.to_string()));

        let sent = h.messaging.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, HANDOFF_MESSAGE);

        let log = executions::list_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].execution_status, ExecutionStatus::HumanNeeded);
    }

    #[tokio::test]
    async fn business_hours_skip_generates_nothing() {
        let h = harness().await;
        let mut scenario = make_scenario("sc-1");
        // A zero-width window is never open.
        scenario.business_hours = Some(BusinessHours {
            start: "00:00".to_string(),
            end: "00:00".to_string(),
            timezone: "America/New_York".to_string(),
        });
        let conv = seed(&h, &scenario).await;

        let outcome = h
            .executor
            .execute(&scenario, &conv, "hello", None)
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::SkippedBusinessHours);
        assert!(h.completion.prompts().await.is_empty(), "no generation on skip");
        assert!(h.messaging.sent().await.is_empty());

        // Exactly one audit row, and nothing was scheduled.
        let log = executions::list_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].execution_status,
            ExecutionStatus::SkippedBusinessHours
        );
        assert!(followups::get_state(&h.db, &conv.id, &scenario.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn completion_failure_logs_failed_and_propagates() {
        let h = harness().await;
        let scenario = make_scenario("sc-1");
        let conv = seed(&h, &scenario).await;
        h.completion.fail_next().await;

        let err = h
            .executor
            .execute(&scenario, &conv, "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CanvassError::Provider { .. }));
        assert!(h.messaging.sent().await.is_empty());

        let log = executions::list_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].execution_status, ExecutionStatus::Failed);
        assert!(log[0].error_message.is_some());
    }

    #[tokio::test]
    async fn send_failure_abandons_turn_without_message_row() {
        let h = harness().await;
        let scenario = make_scenario("sc-1");
        let conv = seed(&h, &scenario).await;
        h.completion.add_response("a reply").await;
        h.messaging.fail_for("+15550100100").await;

        let err = h
            .executor
            .execute(&scenario, &conv, "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CanvassError::Transport { .. }));

        // Only the seeded inbound message exists; no partial commit.
        let history = messages::get_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(followups::get_state(&h.db, &conv.id, &scenario.id)
            .await
            .unwrap()
            .is_none());

        let log = executions::list_for_conversation(&h.db, &conv.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].execution_status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn followup_turn_appends_stage_instructions_and_advances() {
        let h = harness().await;
        let scenario = make_scenario("sc-1");
        let conv = seed(&h, &scenario).await;
        h.completion.add_response("Just checking in!").await;

        // Simulate a prior initial turn.
        let engine = FollowupEngine::new(h.db.clone());
        engine
            .record_turn(&conv.id, &scenario.id, TurnActor::Ai)
            .await
            .unwrap();

        let ctx = FollowupContext {
            stage_number: 1,
            instructions: Some("Re-engage politely.".to_string()),
        };
        h.executor
            .execute(&scenario, &conv, "Tell me more", Some(&ctx))
            .await
            .unwrap();

        let prompts = h.completion.prompts().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Re-engage politely."));
        assert!(prompts[0].contains("STOP_SCENARIO"), "sentinel rules present");

        let state = followups::get_state(&h.db, &conv.id, &scenario.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_stage, 1);
        assert_eq!(state.total_attempts, 1);
    }
}
