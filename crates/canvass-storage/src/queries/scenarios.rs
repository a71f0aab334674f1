// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario configuration queries: personas, owned-number assignment,
//! counterpart restrictions, and follow-up stage schedules.

use canvass_core::types::BusinessHours;
use canvass_core::CanvassError;
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};
use crate::models::{FollowupStage, Scenario};
use crate::queries::{parse_col, parse_json_list};

const COLUMNS: &str = "id, workspace_id, name, instructions, active, max_followup_attempts, \
     business_hours_enabled, business_hours_start, business_hours_end, \
     business_hours_timezone, stop_keywords, created_at";

fn map_row(row: &Row<'_>) -> Result<Scenario, rusqlite::Error> {
    let hours_enabled: bool = row.get(6)?;
    let business_hours = if hours_enabled {
        Some(BusinessHours {
            start: row.get(7)?,
            end: row.get(8)?,
            timezone: row.get(9)?,
        })
    } else {
        None
    };
    let stop_keywords = match row.get::<_, Option<String>>(10)? {
        Some(raw) => Some(parse_json_list(10, raw)?),
        None => None,
    };
    Ok(Scenario {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        instructions: row.get(3)?,
        active: row.get(4)?,
        max_followup_attempts: row.get(5)?,
        business_hours,
        stop_keywords,
        created_at: row.get(11)?,
    })
}

/// Insert a scenario row.
pub async fn insert(db: &Database, scenario: &Scenario) -> Result<(), CanvassError> {
    let scenario = scenario.clone();
    db.connection()
        .call(move |conn| {
            let (enabled, start, end, tz) = match &scenario.business_hours {
                Some(h) => (
                    true,
                    Some(h.start.clone()),
                    Some(h.end.clone()),
                    Some(h.timezone.clone()),
                ),
                None => (false, None, None, None),
            };
            let stop_keywords = scenario
                .stop_keywords
                .as_ref()
                .map(|k| serde_json::to_string(k).unwrap_or_else(|_| "[]".to_string()));
            conn.execute(
                "INSERT INTO scenarios
                 (id, workspace_id, name, instructions, active, max_followup_attempts,
                  business_hours_enabled, business_hours_start, business_hours_end,
                  business_hours_timezone, stop_keywords, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    scenario.id,
                    scenario.workspace_id,
                    scenario.name,
                    scenario.instructions,
                    scenario.active,
                    scenario.max_followup_attempts,
                    enabled,
                    start,
                    end,
                    tz,
                    stop_keywords,
                    scenario.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Fetch a scenario by id.
pub async fn get_by_id(db: &Database, id: &str) -> Result<Option<Scenario>, CanvassError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM scenarios WHERE id = ?1"))?;
            let result = stmt.query_row(params![id], map_row);
            match result {
                Ok(s) => Ok(Some(s)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Assign an owned phone number to a scenario.
pub async fn assign_number(
    db: &Database,
    scenario_id: &str,
    phone_number: &str,
) -> Result<(), CanvassError> {
    let scenario_id = scenario_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO scenario_numbers (scenario_id, phone_number)
                 VALUES (?1, ?2)",
                params![scenario_id, phone_number],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Restrict a scenario to a specific counterpart number.
pub async fn add_restriction(
    db: &Database,
    scenario_id: &str,
    phone_number: &str,
) -> Result<(), CanvassError> {
    let scenario_id = scenario_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO scenario_restrictions (scenario_id, phone_number)
                 VALUES (?1, ?2)",
                params![scenario_id, phone_number],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Active scenarios assigned to an owned number, in storage order.
///
/// The matcher takes the first candidate whose restrictions admit the
/// sender. Storage order is insertion order here; the data model permits
/// overlapping assignments with no priority field.
pub async fn active_for_number(
    db: &Database,
    owned_number: &str,
) -> Result<Vec<Scenario>, CanvassError> {
    let owned_number = owned_number.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM scenarios s
                 JOIN scenario_numbers sn ON sn.scenario_id = s.id
                 WHERE sn.phone_number = ?1 AND s.active = 1
                 ORDER BY s.rowid ASC",
                COLUMNS
                    .split(", ")
                    .map(|c| format!("s.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))?;
            let rows = stmt.query_map(params![owned_number], map_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The counterpart allow-list for a scenario. Empty means unrestricted.
pub async fn restrictions_for(
    db: &Database,
    scenario_id: &str,
) -> Result<Vec<String>, CanvassError> {
    let scenario_id = scenario_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT phone_number FROM scenario_restrictions WHERE scenario_id = ?1",
            )?;
            let rows = stmt.query_map(params![scenario_id], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a follow-up stage configuration row.
pub async fn insert_stage(db: &Database, stage: &FollowupStage) -> Result<(), CanvassError> {
    let stage = stage.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO followup_stages
                 (scenario_id, stage_number, wait_duration, wait_unit, instructions)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    stage.scenario_id,
                    stage.stage_number,
                    stage.wait_duration,
                    stage.wait_unit.to_string(),
                    stage.instructions,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// The stage configuration for (scenario, stage_number), if configured.
pub async fn stage_for(
    db: &Database,
    scenario_id: &str,
    stage_number: u32,
) -> Result<Option<FollowupStage>, CanvassError> {
    let scenario_id = scenario_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT scenario_id, stage_number, wait_duration, wait_unit, instructions
                 FROM followup_stages WHERE scenario_id = ?1 AND stage_number = ?2",
            )?;
            let result = stmt.query_row(params![scenario_id, stage_number], |row| {
                Ok(FollowupStage {
                    scenario_id: row.get(0)?,
                    stage_number: row.get(1)?,
                    wait_duration: row.get(2)?,
                    wait_unit: parse_col(3, row.get::<_, String>(3)?)?,
                    instructions: row.get(4)?,
                })
            });
            match result {
                Ok(s) => Ok(Some(s)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WaitUnit;
    use canvass_core::types::now_rfc3339;
    use tempfile::tempdir;

    pub(crate) fn make_scenario(id: &str, name: &str) -> Scenario {
        Scenario {
            id: id.to_string(),
            workspace_id: "ws-1".to_string(),
            name: name.to_string(),
            instructions: "You are a friendly sales assistant.".to_string(),
            active: true,
            max_followup_attempts: 5,
            business_hours: None,
            stop_keywords: None,
            created_at: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn active_for_number_honors_assignment_and_active_flag() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("s.db").to_str().unwrap())
            .await
            .unwrap();

        insert(&db, &make_scenario("sc1", "first")).await.unwrap();
        let mut inactive = make_scenario("sc2", "inactive");
        inactive.active = false;
        insert(&db, &inactive).await.unwrap();
        insert(&db, &make_scenario("sc3", "unassigned")).await.unwrap();

        assign_number(&db, "sc1", "+15550100001").await.unwrap();
        assign_number(&db, "sc2", "+15550100001").await.unwrap();

        let found = active_for_number(&db, "+15550100001").await.unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["sc1"]);
    }

    #[tokio::test]
    async fn candidates_come_back_in_storage_order() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("order.db").to_str().unwrap())
            .await
            .unwrap();

        insert(&db, &make_scenario("sc-b", "second")).await.unwrap();
        insert(&db, &make_scenario("sc-a", "first")).await.unwrap();
        assign_number(&db, "sc-b", "+15550100001").await.unwrap();
        assign_number(&db, "sc-a", "+15550100001").await.unwrap();

        let found = active_for_number(&db, "+15550100001").await.unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        // Insertion order of the scenarios table, not of the assignment.
        assert_eq!(ids, vec!["sc-b", "sc-a"]);
    }

    #[tokio::test]
    async fn business_hours_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("hours.db").to_str().unwrap())
            .await
            .unwrap();

        let mut scenario = make_scenario("sc1", "hours");
        scenario.business_hours = Some(BusinessHours {
            start: "09:00".to_string(),
            end: "18:00".to_string(),
            timezone: "America/New_York".to_string(),
        });
        scenario.stop_keywords = Some(vec!["STOP".to_string(), "BASTA".to_string()]);
        insert(&db, &scenario).await.unwrap();

        let loaded = get_by_id(&db, "sc1").await.unwrap().unwrap();
        let hours = loaded.business_hours.unwrap();
        assert_eq!(hours.start, "09:00");
        assert_eq!(hours.timezone, "America/New_York");
        assert_eq!(
            loaded.stop_keywords.unwrap(),
            vec!["STOP".to_string(), "BASTA".to_string()]
        );
    }

    #[tokio::test]
    async fn stage_lookup_finds_configured_stages_only() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("stages.db").to_str().unwrap())
            .await
            .unwrap();
        insert(&db, &make_scenario("sc1", "staged")).await.unwrap();

        insert_stage(
            &db,
            &FollowupStage {
                scenario_id: "sc1".to_string(),
                stage_number: 1,
                wait_duration: 2,
                wait_unit: WaitUnit::Days,
                instructions: Some("Gently nudge the customer.".to_string()),
            },
        )
        .await
        .unwrap();

        let stage = stage_for(&db, "sc1", 1).await.unwrap().unwrap();
        assert_eq!(stage.wait_duration, 2);
        assert_eq!(stage.wait_unit, WaitUnit::Days);
        assert!(stage_for(&db, "sc1", 2).await.unwrap().is_none());
    }
}
