// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic follow-up sweep.
//!
//! Collects every due, unstopped follow-up state and runs one AI turn for
//! each through the executor. Failures are isolated per item: one broken
//! conversation never aborts the sweep, and only the initial due-state query
//! can fail the sweep as a whole.

use std::sync::Arc;
use std::time::Duration;

use canvass_core::types::{now_rfc3339, FollowupState};
use canvass_core::CanvassError;
use canvass_storage::queries::{conversations, followups, messages, scenarios};
use canvass_storage::Database;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::executor::{FollowupContext, ScenarioExecutor};

/// Upper bound on AI turns running at once within a sweep.
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 4;

/// Upper bound on one item's generation + send.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(60);

/// Tally for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due states picked up this pass.
    pub processed: usize,
    /// Items whose turn completed, whatever the model decided.
    pub succeeded: usize,
    /// Items that errored or timed out.
    pub failed: usize,
}

pub struct FollowupScheduler {
    db: Arc<Database>,
    executor: Arc<ScenarioExecutor>,
    concurrency: usize,
    item_timeout: Duration,
}

impl FollowupScheduler {
    pub fn new(db: Arc<Database>, executor: Arc<ScenarioExecutor>) -> Self {
        Self {
            db,
            executor,
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Run one sweep pass over everything due as of now.
    pub async fn sweep(&self) -> Result<SweepReport, CanvassError> {
        let now = now_rfc3339();
        let due = followups::due_states(&self.db, &now).await?;
        if due.is_empty() {
            debug!("no follow-ups due");
            return Ok(SweepReport::default());
        }
        info!(due = due.len(), "sweeping due follow-ups");

        let results: Vec<bool> = stream::iter(due.iter())
            .map(|state| self.process_item(state))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        let report = SweepReport {
            processed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        };
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "sweep complete"
        );
        Ok(report)
    }

    /// Run one due item. Returns whether the turn completed.
    async fn process_item(&self, state: &FollowupState) -> bool {
        match tokio::time::timeout(self.item_timeout, self.run_turn(state)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(
                    conversation_id = %state.conversation_id,
                    scenario_id = %state.scenario_id,
                    error = %e,
                    "follow-up turn failed"
                );
                false
            }
            Err(_) => {
                warn!(
                    conversation_id = %state.conversation_id,
                    scenario_id = %state.scenario_id,
                    timeout_s = self.item_timeout.as_secs(),
                    "follow-up turn timed out"
                );
                false
            }
        }
    }

    async fn run_turn(&self, state: &FollowupState) -> Result<(), CanvassError> {
        // Re-read under the current state of the world; the due snapshot may
        // be stale by the time this item runs.
        let conversation = conversations::get_by_id(&self.db, &state.conversation_id)
            .await?
            .ok_or_else(|| {
                CanvassError::Internal(format!(
                    "followup state {} references missing conversation {}",
                    state.id, state.conversation_id
                ))
            })?;
        if conversation.manual_override {
            debug!(conversation_id = %conversation.id, "manual override set, skipping follow-up");
            return Ok(());
        }
        let scenario = scenarios::get_by_id(&self.db, &state.scenario_id)
            .await?
            .ok_or_else(|| {
                CanvassError::Internal(format!(
                    "followup state {} references missing scenario {}",
                    state.id, state.scenario_id
                ))
            })?;

        let next_stage = state.current_stage + 1;
        let stage = scenarios::stage_for(&self.db, &scenario.id, next_stage).await?;
        let ctx = FollowupContext {
            stage_number: next_stage,
            instructions: stage.and_then(|s| s.instructions),
        };

        // Synthetic trigger: the customer's last inbound message, if any.
        let trigger = messages::last_inbound(&self.db, &conversation.id)
            .await?
            .map(|m| m.body)
            .unwrap_or_default();

        self.executor
            .execute(&scenario, &conversation, &trigger, Some(&ctx))
            .await?;
        Ok(())
    }
}
