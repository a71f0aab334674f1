// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selects the single active scenario authorized to answer an inbound message.

use std::sync::Arc;

use canvass_core::phone;
use canvass_core::types::Scenario;
use canvass_core::CanvassError;
use canvass_storage::queries::scenarios;
use canvass_storage::Database;
use tracing::debug;

/// First-match scenario selection for an inbound (to, from) pair.
///
/// Multiple active scenarios may be assigned to the same owned number with
/// overlapping or absent restrictions; the matcher takes the first candidate
/// in storage order rather than ranking them. There is no conflict detection
/// at configuration time. Known limitation.
pub struct ScenarioMatcher {
    db: Arc<Database>,
}

impl ScenarioMatcher {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find the scenario that should answer a message sent to
    /// `recipient_number` (an owned number) by `sender_number` (the external
    /// party). Returns `None` when no assigned scenario admits the sender.
    pub async fn match_scenario(
        &self,
        recipient_number: &str,
        sender_number: &str,
    ) -> Result<Option<Scenario>, CanvassError> {
        let recipient = phone::normalize(recipient_number);
        let sender = phone::normalize(sender_number);

        let candidates = scenarios::active_for_number(&self.db, &recipient).await?;
        for candidate in candidates {
            let restrictions = scenarios::restrictions_for(&self.db, &candidate.id).await?;
            if restrictions.is_empty() || restrictions.iter().any(|r| r == &sender) {
                debug!(scenario_id = %candidate.id, %recipient, "scenario matched");
                return Ok(Some(candidate));
            }
        }
        debug!(%recipient, %sender, "no scenario matched");
        Ok(None)
    }
}
