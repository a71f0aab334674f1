// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-(conversation, scenario) follow-up state machine.
//!
//! States: `idle` (no row yet) -> `active(stage = n)` -> `stopped`.
//! `stopped` is an absorbing latch: max attempts reached, a stop keyword in
//! an inbound message, or manual override all land here, and nothing in this
//! engine re-activates a stopped state. Resuming automation requires a fresh
//! scenario assignment by a human.

use std::sync::Arc;

use canvass_core::types::{
    format_rfc3339, now_rfc3339, Conversation, ConversationPatch, FollowupState,
    FollowupStatePatch, Scenario,
};
use canvass_core::CanvassError;
use canvass_storage::queries::{conversations, followups, scenarios};
use canvass_storage::{ConditionalInsert, Database};
use tracing::{debug, info, warn};

/// Keyword set used when a scenario does not configure its own.
pub const DEFAULT_STOP_KEYWORDS: [&str; 5] = ["STOP", "UNSUBSCRIBE", "CANCEL", "END", "QUIT"];

/// Who authored a recorded turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnActor {
    Ai,
    Human,
}

/// Owns follow-up stage advancement, scheduling, stop policy, and the
/// conversation labeling/override operations.
pub struct FollowupEngine {
    db: Arc<Database>,
}

impl FollowupEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record that a turn was sent into the conversation.
    ///
    /// On AI-authored turns this ensures a state row exists (created at
    /// stage 0) and clears `next_followup_at`, pending recomputation by
    /// [`schedule_next`](Self::schedule_next). Human turns are not tracked.
    pub async fn record_turn(
        &self,
        conversation_id: &str,
        scenario_id: &str,
        actor: TurnActor,
    ) -> Result<(), CanvassError> {
        if actor != TurnActor::Ai {
            return Ok(());
        }

        let state = match followups::get_state(&self.db, conversation_id, scenario_id).await? {
            Some(state) => state,
            None => {
                let now = now_rfc3339();
                let candidate = FollowupState {
                    id: uuid::Uuid::new_v4().to_string(),
                    conversation_id: conversation_id.to_string(),
                    scenario_id: scenario_id.to_string(),
                    current_stage: 0,
                    total_attempts: 0,
                    stopped: false,
                    next_followup_at: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                match followups::insert_state(&self.db, &candidate).await? {
                    ConditionalInsert::Inserted => {
                        debug!(conversation_id, scenario_id, "followup state created");
                        return Ok(());
                    }
                    // A concurrent turn created the row first; fall through
                    // to the reset below on the surviving row.
                    ConditionalInsert::DuplicateKey => followups::get_state(
                        &self.db,
                        conversation_id,
                        scenario_id,
                    )
                    .await?
                    .ok_or_else(|| {
                        CanvassError::Internal(
                            "followup state vanished after duplicate insert".to_string(),
                        )
                    })?,
                }
            }
        };

        followups::update_state(
            &self.db,
            &state.id,
            &FollowupStatePatch {
                next_followup_at: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// One stage fired and its follow-up was sent: increment `current_stage`
    /// and `total_attempts`. Both counters are monotonic; this is the only
    /// place they move, and it runs exactly once per sent follow-up.
    pub async fn advance_stage(
        &self,
        conversation_id: &str,
        scenario_id: &str,
    ) -> Result<(), CanvassError> {
        let state = followups::get_state(&self.db, conversation_id, scenario_id)
            .await?
            .ok_or_else(|| {
                CanvassError::Internal(format!(
                    "no followup state for conversation {conversation_id}"
                ))
            })?;
        followups::update_state(
            &self.db,
            &state.id,
            &FollowupStatePatch {
                current_stage: Some(state.current_stage + 1),
                total_attempts: Some(state.total_attempts + 1),
                ..Default::default()
            },
        )
        .await
    }

    /// Compute and persist the next due time from the next stage's wait
    /// duration. Latches `stopped` instead when attempts are exhausted or no
    /// further stage is configured. Returns the scheduled time, if any.
    pub async fn schedule_next(
        &self,
        conversation_id: &str,
        scenario: &Scenario,
    ) -> Result<Option<String>, CanvassError> {
        let state = match followups::get_state(&self.db, conversation_id, &scenario.id).await? {
            Some(state) => state,
            None => return Ok(None),
        };
        if state.stopped {
            return Ok(None);
        }
        if state.total_attempts >= scenario.max_followup_attempts {
            info!(
                conversation_id,
                scenario_id = %scenario.id,
                attempts = state.total_attempts,
                "max follow-up attempts reached, stopping"
            );
            self.latch_stop(&state).await?;
            return Ok(None);
        }

        let next_stage = state.current_stage + 1;
        let Some(stage) = scenarios::stage_for(&self.db, &scenario.id, next_stage).await? else {
            debug!(
                conversation_id,
                scenario_id = %scenario.id,
                stage = next_stage,
                "no further stage configured, stopping"
            );
            self.latch_stop(&state).await?;
            return Ok(None);
        };

        let Some(wait) = stage.wait_unit.to_duration(stage.wait_duration) else {
            warn!(
                conversation_id,
                scenario_id = %scenario.id,
                stage = next_stage,
                wait_duration = stage.wait_duration,
                "stage wait duration out of range, stopping"
            );
            self.latch_stop(&state).await?;
            return Ok(None);
        };
        let due = chrono::Utc::now() + wait;
        let due = format_rfc3339(&due);
        followups::update_state(
            &self.db,
            &state.id,
            &FollowupStatePatch {
                next_followup_at: Some(Some(due.clone())),
                ..Default::default()
            },
        )
        .await?;
        debug!(conversation_id, stage = next_stage, %due, "follow-up scheduled");
        Ok(Some(due))
    }

    /// Latch the state for one (conversation, scenario) pair to stopped.
    pub async fn stop(
        &self,
        conversation_id: &str,
        scenario_id: &str,
    ) -> Result<(), CanvassError> {
        if let Some(state) = followups::get_state(&self.db, conversation_id, scenario_id).await? {
            self.latch_stop(&state).await?;
        }
        Ok(())
    }

    async fn latch_stop(&self, state: &FollowupState) -> Result<(), CanvassError> {
        followups::update_state(
            &self.db,
            &state.id,
            &FollowupStatePatch {
                stopped: Some(true),
                next_followup_at: Some(None),
                ..Default::default()
            },
        )
        .await
    }

    /// True when an inbound body contains a stop keyword.
    ///
    /// Containment is case-insensitive against the scenario's configured set,
    /// falling back to [`DEFAULT_STOP_KEYWORDS`].
    pub fn stop_keyword_hit(scenario: &Scenario, inbound_body: &str) -> bool {
        let body = inbound_body.to_uppercase();
        match &scenario.stop_keywords {
            Some(keywords) => keywords.iter().any(|k| body.contains(&k.to_uppercase())),
            None => DEFAULT_STOP_KEYWORDS.iter().any(|k| body.contains(k)),
        }
    }

    /// Add a label to a conversation. Set semantics: adding a present label
    /// is a no-op.
    pub async fn add_label(&self, conversation_id: &str, label: &str) -> Result<(), CanvassError> {
        let conv = self.require_conversation(conversation_id).await?;
        if conv.labels.iter().any(|l| l == label) {
            return Ok(());
        }
        let mut labels = conv.labels;
        labels.push(label.to_string());
        conversations::update(
            &self.db,
            conversation_id,
            &ConversationPatch {
                labels: Some(labels),
                ..Default::default()
            },
        )
        .await
    }

    /// Remove a label from a conversation. A no-op if absent.
    pub async fn remove_label(
        &self,
        conversation_id: &str,
        label: &str,
    ) -> Result<(), CanvassError> {
        let conv = self.require_conversation(conversation_id).await?;
        if !conv.labels.iter().any(|l| l == label) {
            return Ok(());
        }
        let labels = conv.labels.into_iter().filter(|l| l != label).collect();
        conversations::update(
            &self.db,
            conversation_id,
            &ConversationPatch {
                labels: Some(labels),
                ..Default::default()
            },
        )
        .await
    }

    /// Set a conversation's manual override. Enabling also latches every
    /// follow-up state for the conversation to stopped.
    pub async fn set_manual_override(
        &self,
        conversation_id: &str,
        enabled: bool,
    ) -> Result<(), CanvassError> {
        self.require_conversation(conversation_id).await?;
        conversations::update(
            &self.db,
            conversation_id,
            &ConversationPatch {
                manual_override: Some(enabled),
                ..Default::default()
            },
        )
        .await?;
        if enabled {
            followups::stop_all_for_conversation(&self.db, conversation_id).await?;
            info!(conversation_id, "manual override enabled, follow-ups stopped");
        }
        Ok(())
    }

    /// Pure business-hours gate.
    ///
    /// With hours disabled this is always true. Otherwise `now` is converted
    /// to the scenario's timezone and compared against [start, end) as local
    /// time-of-day. Windows crossing midnight are not handled. A malformed
    /// timezone or time string fails open with a warning: responding is the
    /// engine's primary function.
    pub fn is_within_business_hours(
        scenario: &Scenario,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let Some(hours) = &scenario.business_hours else {
            return true;
        };
        let tz: chrono_tz::Tz = match hours.timezone.parse() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(scenario_id = %scenario.id, timezone = %hours.timezone, "unknown timezone");
                return true;
            }
        };
        let (Ok(start), Ok(end)) = (
            chrono::NaiveTime::parse_from_str(&hours.start, "%H:%M"),
            chrono::NaiveTime::parse_from_str(&hours.end, "%H:%M"),
        ) else {
            warn!(scenario_id = %scenario.id, "malformed business hours");
            return true;
        };
        let local = now.with_timezone(&tz).time();
        local >= start && local < end
    }

    async fn require_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Conversation, CanvassError> {
        conversations::get_by_id(&self.db, conversation_id)
            .await?
            .ok_or_else(|| {
                CanvassError::Validation(format!("conversation {conversation_id} not found"))
            })
    }
}
