// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI-turn execution audit log. Append-only: the engine writes one row per
//! executor call and never reads the log to make decisions.

use canvass_core::CanvassError;
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};
use crate::models::ScenarioExecution;
use crate::queries::parse_col;

const COLUMNS: &str = "id, conversation_id, scenario_id, trigger_body, prompt, response, \
     tokens_used, model, processing_ms, execution_status, error_message, created_at";

fn map_row(row: &Row<'_>) -> Result<ScenarioExecution, rusqlite::Error> {
    Ok(ScenarioExecution {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        scenario_id: row.get(2)?,
        trigger_body: row.get(3)?,
        prompt: row.get(4)?,
        response: row.get(5)?,
        tokens_used: row.get(6)?,
        model: row.get(7)?,
        processing_ms: row.get(8)?,
        execution_status: parse_col(9, row.get::<_, String>(9)?)?,
        error_message: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Append one execution log row.
pub async fn insert(db: &Database, exec: &ScenarioExecution) -> Result<(), CanvassError> {
    let exec = exec.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scenario_executions
                 (id, conversation_id, scenario_id, trigger_body, prompt, response,
                  tokens_used, model, processing_ms, execution_status, error_message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    exec.id,
                    exec.conversation_id,
                    exec.scenario_id,
                    exec.trigger_body,
                    exec.prompt,
                    exec.response,
                    exec.tokens_used,
                    exec.model,
                    exec.processing_ms,
                    exec.execution_status.to_string(),
                    exec.error_message,
                    exec.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// The audit trail for a conversation, oldest first. Analytics/debugging only.
pub async fn list_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<ScenarioExecution>, CanvassError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scenario_executions
                 WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], map_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_core::types::{now_rfc3339, ExecutionStatus};
    use tempfile::tempdir;

    fn make_exec(id: &str, status: ExecutionStatus) -> ScenarioExecution {
        ScenarioExecution {
            id: id.to_string(),
            conversation_id: "conv-1".to_string(),
            scenario_id: "sc-1".to_string(),
            trigger_body: "hi".to_string(),
            prompt: "instructions".to_string(),
            response: None,
            tokens_used: None,
            model: None,
            processing_ms: None,
            execution_status: status,
            error_message: None,
            created_at: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn log_rows_round_trip_with_status() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("exec.db").to_str().unwrap())
            .await
            .unwrap();

        insert(&db, &make_exec("e1", ExecutionStatus::SkippedBusinessHours))
            .await
            .unwrap();
        insert(&db, &make_exec("e2", ExecutionStatus::Success))
            .await
            .unwrap();

        let log = list_for_conversation(&db, "conv-1").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[0].execution_status,
            ExecutionStatus::SkippedBusinessHours
        );
        assert_eq!(log[1].execution_status, ExecutionStatus::Success);
    }
}
