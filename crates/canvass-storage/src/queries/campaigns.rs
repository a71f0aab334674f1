// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign and campaign-message queries.
//!
//! Status transitions are expressed as single-row conditional updates
//! (`WHERE id = ? AND status = ?`) so concurrent callers cannot double-start
//! or resurrect a finished campaign.

use canvass_core::CanvassError;
use rusqlite::{params, params_from_iter, Row};

use crate::database::{map_tr_err, Database};
use crate::models::{Campaign, CampaignMessage, CampaignPatch};
use crate::queries::{parse_col, parse_json_list, to_json_list};

const COLUMNS: &str = "id, workspace_id, message_template, sender_number, contact_list_ids, \
     delay_between_messages_ms, status, sent_count, failed_count, started_at, \
     completed_at, created_at";

fn map_row(row: &Row<'_>) -> Result<Campaign, rusqlite::Error> {
    Ok(Campaign {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        message_template: row.get(2)?,
        sender_number: row.get(3)?,
        contact_list_ids: parse_json_list(4, row.get::<_, String>(4)?)?,
        delay_between_messages_ms: row.get(5)?,
        status: parse_col(6, row.get::<_, String>(6)?)?,
        sent_count: row.get(7)?,
        failed_count: row.get(8)?,
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Insert a campaign row (normally created by the UI layer in `draft`).
pub async fn insert(db: &Database, campaign: &Campaign) -> Result<(), CanvassError> {
    let campaign = campaign.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns
                 (id, workspace_id, message_template, sender_number, contact_list_ids,
                  delay_between_messages_ms, status, sent_count, failed_count,
                  started_at, completed_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    campaign.id,
                    campaign.workspace_id,
                    campaign.message_template,
                    campaign.sender_number,
                    to_json_list(&campaign.contact_list_ids),
                    campaign.delay_between_messages_ms,
                    campaign.status.to_string(),
                    campaign.sent_count,
                    campaign.failed_count,
                    campaign.started_at,
                    campaign.completed_at,
                    campaign.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Fetch a campaign by id.
pub async fn get_by_id(db: &Database, id: &str) -> Result<Option<Campaign>, CanvassError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM campaigns WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], map_row);
            match result {
                Ok(c) => Ok(Some(c)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Guarded `draft -> running` transition. Returns false if the campaign was
/// not in `draft` (already started, finished, or paused).
pub async fn mark_running(db: &Database, id: &str, started_at: &str) -> Result<bool, CanvassError> {
    let id = id.to_string();
    let started_at = started_at.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaigns SET status = 'running', started_at = ?1
                 WHERE id = ?2 AND status = 'draft'",
                params![started_at, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Guarded `running -> paused` transition. Returns false if the campaign was
/// not running.
pub async fn mark_paused(db: &Database, id: &str) -> Result<bool, CanvassError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaigns SET status = 'paused' WHERE id = ?1 AND status = 'running'",
                params![id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Guarded `running -> completed` transition. A no-op when the campaign was
/// paused mid-run, so a cooperative stop is never overwritten.
pub async fn mark_completed(
    db: &Database,
    id: &str,
    completed_at: &str,
) -> Result<bool, CanvassError> {
    let id = id.to_string();
    let completed_at = completed_at.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE campaigns SET status = 'completed', completed_at = ?1
                 WHERE id = ?2 AND status = 'running'",
                params![completed_at, id],
            )?;
            Ok(n == 1)
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Apply a partial update (running totals, status) to a campaign row.
pub async fn update(db: &Database, id: &str, patch: &CampaignPatch) -> Result<(), CanvassError> {
    let id = id.to_string();
    let patch = patch.clone();
    db.connection()
        .call(move |conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(v) = patch.status {
                sets.push("status = ?");
                values.push(Box::new(v.to_string()));
            }
            if let Some(v) = patch.sent_count {
                sets.push("sent_count = ?");
                values.push(Box::new(v));
            }
            if let Some(v) = patch.failed_count {
                sets.push("failed_count = ?");
                values.push(Box::new(v));
            }
            if let Some(v) = &patch.started_at {
                sets.push("started_at = ?");
                values.push(Box::new(v.clone()));
            }
            if let Some(v) = &patch.completed_at {
                sets.push("completed_at = ?");
                values.push(Box::new(v.clone()));
            }
            if sets.is_empty() {
                return Ok(());
            }
            values.push(Box::new(id));

            let assignments: Vec<String> = sets
                .iter()
                .enumerate()
                .map(|(i, s)| s.replace('?', &format!("?{}", i + 1)))
                .collect();
            let sql = format!(
                "UPDATE campaigns SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len()
            );
            conn.execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Append one per-recipient audit row. Never updated after insert.
pub async fn insert_campaign_message(
    db: &Database,
    msg: &CampaignMessage,
) -> Result<(), CanvassError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaign_messages
                 (id, campaign_id, contact_id, phone_number, status, error_message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.id,
                    msg.campaign_id,
                    msg.contact_id,
                    msg.phone_number,
                    msg.status.to_string(),
                    msg.error_message,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// The audit trail for a campaign, in processing order.
pub async fn list_campaign_messages(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<CampaignMessage>, CanvassError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, campaign_id, contact_id, phone_number, status, error_message, created_at
                 FROM campaign_messages WHERE campaign_id = ?1 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![campaign_id], |row| {
                Ok(CampaignMessage {
                    id: row.get(0)?,
                    campaign_id: row.get(1)?,
                    contact_id: row.get(2)?,
                    phone_number: row.get(3)?,
                    status: parse_col(4, row.get::<_, String>(4)?)?,
                    error_message: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CampaignStatus;
    use canvass_core::types::now_rfc3339;
    use tempfile::tempdir;

    async fn open_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("campaigns.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_campaign(id: &str) -> Campaign {
        Campaign {
            id: id.to_string(),
            workspace_id: "ws-1".to_string(),
            message_template: "Hi {business_name}".to_string(),
            sender_number: "+15550100001".to_string(),
            contact_list_ids: vec!["list-a".to_string()],
            delay_between_messages_ms: 0,
            status: CampaignStatus::Draft,
            sent_count: 0,
            failed_count: 0,
            started_at: None,
            completed_at: None,
            created_at: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn draft_starts_exactly_once() {
        let (db, _dir) = open_db().await;
        insert(&db, &make_campaign("cp1")).await.unwrap();

        assert!(mark_running(&db, "cp1", &now_rfc3339()).await.unwrap());
        // Second start attempt is rejected by the status guard.
        assert!(!mark_running(&db, "cp1", &now_rfc3339()).await.unwrap());

        let campaign = get_by_id(&db, "cp1").await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Running);
        assert!(campaign.started_at.is_some());
    }

    #[tokio::test]
    async fn pause_only_applies_to_running_campaigns() {
        let (db, _dir) = open_db().await;
        insert(&db, &make_campaign("cp1")).await.unwrap();

        assert!(!mark_paused(&db, "cp1").await.unwrap(), "draft cannot pause");
        mark_running(&db, "cp1", &now_rfc3339()).await.unwrap();
        assert!(mark_paused(&db, "cp1").await.unwrap());

        // Completion does not overwrite the pause.
        assert!(!mark_completed(&db, "cp1", &now_rfc3339()).await.unwrap());
        let campaign = get_by_id(&db, "cp1").await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Paused);
    }

    #[tokio::test]
    async fn running_totals_update_incrementally() {
        let (db, _dir) = open_db().await;
        insert(&db, &make_campaign("cp1")).await.unwrap();
        mark_running(&db, "cp1", &now_rfc3339()).await.unwrap();

        update(
            &db,
            "cp1",
            &CampaignPatch {
                sent_count: Some(3),
                failed_count: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let campaign = get_by_id(&db, "cp1").await.unwrap().unwrap();
        assert_eq!(campaign.sent_count, 3);
        assert_eq!(campaign.failed_count, 1);
        assert_eq!(campaign.status, CampaignStatus::Running);
    }

    #[tokio::test]
    async fn campaign_messages_are_append_only_audit_rows() {
        let (db, _dir) = open_db().await;
        insert(&db, &make_campaign("cp1")).await.unwrap();

        let msg = CampaignMessage {
            id: "cm1".to_string(),
            campaign_id: "cp1".to_string(),
            contact_id: "ct1".to_string(),
            phone_number: "+15550100100".to_string(),
            status: crate::models::CampaignMessageStatus::Failed,
            error_message: Some("invalid number".to_string()),
            created_at: now_rfc3339(),
        };
        insert_campaign_message(&db, &msg).await.unwrap();

        let trail = list_campaign_messages(&db, "cp1").await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].error_message.as_deref(), Some("invalid number"));
    }
}
