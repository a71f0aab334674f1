// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up state persistence.
//!
//! One row per (conversation, scenario), guarded by a UNIQUE constraint so
//! concurrent `record_turn` calls converge on a single state machine row.

use canvass_core::CanvassError;
use rusqlite::{params, params_from_iter, Row};

use crate::database::{is_unique_violation, map_tr_err, Database};
use crate::models::{FollowupState, FollowupStatePatch};
use crate::queries::ConditionalInsert;

const COLUMNS: &str = "id, conversation_id, scenario_id, current_stage, total_attempts, \
     stopped, next_followup_at, created_at, updated_at";

fn map_row(row: &Row<'_>) -> Result<FollowupState, rusqlite::Error> {
    Ok(FollowupState {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        scenario_id: row.get(2)?,
        current_stage: row.get(3)?,
        total_attempts: row.get(4)?,
        stopped: row.get(5)?,
        next_followup_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Fetch the state row for (conversation, scenario), if it exists.
pub async fn get_state(
    db: &Database,
    conversation_id: &str,
    scenario_id: &str,
) -> Result<Option<FollowupState>, CanvassError> {
    let conversation_id = conversation_id.to_string();
    let scenario_id = scenario_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM followup_states
                 WHERE conversation_id = ?1 AND scenario_id = ?2"
            ))?;
            let result = stmt.query_row(params![conversation_id, scenario_id], map_row);
            match result {
                Ok(state) => Ok(Some(state)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a new state row. Returns `DuplicateKey` when a concurrent writer
/// created the row first; callers re-fetch.
pub async fn insert_state(
    db: &Database,
    state: &FollowupState,
) -> Result<ConditionalInsert, CanvassError> {
    let state = state.clone();
    db.connection()
        .call(move |conn| {
            let result = conn.execute(
                "INSERT INTO followup_states
                 (id, conversation_id, scenario_id, current_stage, total_attempts,
                  stopped, next_followup_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    state.id,
                    state.conversation_id,
                    state.scenario_id,
                    state.current_stage,
                    state.total_attempts,
                    state.stopped,
                    state.next_followup_at,
                    state.created_at,
                    state.updated_at,
                ],
            );
            match result {
                Ok(_) => Ok(ConditionalInsert::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(ConditionalInsert::DuplicateKey),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a partial update to a state row.
///
/// `next_followup_at` uses the doubly-optional convention: `Some(None)`
/// clears the column, plain `None` leaves it alone.
pub async fn update_state(
    db: &Database,
    id: &str,
    patch: &FollowupStatePatch,
) -> Result<(), CanvassError> {
    let id = id.to_string();
    let patch = patch.clone();
    db.connection()
        .call(move |conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(v) = patch.current_stage {
                sets.push("current_stage = ?");
                values.push(Box::new(v));
            }
            if let Some(v) = patch.total_attempts {
                sets.push("total_attempts = ?");
                values.push(Box::new(v));
            }
            if let Some(v) = patch.stopped {
                sets.push("stopped = ?");
                values.push(Box::new(v));
            }
            if let Some(v) = &patch.next_followup_at {
                sets.push("next_followup_at = ?");
                values.push(Box::new(v.clone()));
            }

            sets.push("updated_at = ?");
            values.push(Box::new(canvass_core::types::now_rfc3339()));
            values.push(Box::new(id));

            let assignments: Vec<String> = sets
                .iter()
                .enumerate()
                .map(|(i, s)| s.replace('?', &format!("?{}", i + 1)))
                .collect();
            let sql = format!(
                "UPDATE followup_states SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len()
            );
            conn.execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// All non-stopped states whose `next_followup_at` is at or before `now`.
///
/// The RFC 3339 text format compares correctly as strings, so this is a
/// plain indexed range scan.
pub async fn due_states(db: &Database, now: &str) -> Result<Vec<FollowupState>, CanvassError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM followup_states
                 WHERE stopped = 0 AND next_followup_at IS NOT NULL AND next_followup_at <= ?1
                 ORDER BY next_followup_at ASC"
            ))?;
            let rows = stmt.query_map(params![now], map_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Latch every state for a conversation to stopped.
///
/// Used by the manual-override path; the latch is one-way by design, so this
/// never un-stops anything.
pub async fn stop_all_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<(), CanvassError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE followup_states SET stopped = 1, next_followup_at = NULL,
                 updated_at = ?1 WHERE conversation_id = ?2",
                params![canvass_core::types::now_rfc3339(), conversation_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
