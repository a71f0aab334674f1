// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD with the UNIQUE-guarded conditional insert the
//! resolver's race handling is built on.

use canvass_core::CanvassError;
use rusqlite::{params, params_from_iter, Row};

use crate::database::{is_unique_violation, map_tr_err, Database};
use crate::models::{Conversation, ConversationPatch};
use crate::queries::{parse_col, parse_json_list, to_json_list, ConditionalInsert};

const COLUMNS: &str = "id, workspace_id, phone_number, from_number, display_name, \
     last_message_at, status, pinned, labels, manual_override, created_by, \
     created_at, updated_at";

fn map_row(row: &Row<'_>) -> Result<Conversation, rusqlite::Error> {
    Ok(Conversation {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        phone_number: row.get(2)?,
        from_number: row.get(3)?,
        display_name: row.get(4)?,
        last_message_at: row.get(5)?,
        status: parse_col(6, row.get::<_, String>(6)?)?,
        pinned: row.get(7)?,
        labels: parse_json_list(8, row.get::<_, String>(8)?)?,
        manual_override: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Fetch the conversation for an external phone number, if one exists.
pub async fn get_by_phone(
    db: &Database,
    workspace_id: &str,
    phone_number: &str,
) -> Result<Option<Conversation>, CanvassError> {
    let workspace_id = workspace_id.to_string();
    let phone_number = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conversations
                 WHERE workspace_id = ?1 AND phone_number = ?2"
            ))?;
            let result = stmt.query_row(params![workspace_id, phone_number], map_row);
            match result {
                Ok(conv) => Ok(Some(conv)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a conversation by id.
pub async fn get_by_id(db: &Database, id: &str) -> Result<Option<Conversation>, CanvassError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conversations WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], map_row);
            match result {
                Ok(conv) => Ok(Some(conv)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a new conversation.
///
/// Returns [`ConditionalInsert::DuplicateKey`] when the (workspace,
/// phone_number) UNIQUE constraint fires, which means a concurrent resolver
/// created the row first. Any other failure propagates as a storage error.
pub async fn insert(db: &Database, conv: &Conversation) -> Result<ConditionalInsert, CanvassError> {
    let conv = conv.clone();
    db.connection()
        .call(move |conn| {
            let result = conn.execute(
                "INSERT INTO conversations
                 (id, workspace_id, phone_number, from_number, display_name,
                  last_message_at, status, pinned, labels, manual_override,
                  created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    conv.id,
                    conv.workspace_id,
                    conv.phone_number,
                    conv.from_number,
                    conv.display_name,
                    conv.last_message_at,
                    conv.status.to_string(),
                    conv.pinned,
                    to_json_list(&conv.labels),
                    conv.manual_override,
                    conv.created_by,
                    conv.created_at,
                    conv.updated_at,
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

/// Apply a partial update as a single-row conditional write.
///
/// Only fields present in the patch appear in the SET clause, so "not
/// provided" never clobbers a column. `updated_at` is always refreshed.
pub async fn update(
    db: &Database,
    id: &str,
    patch: &ConversationPatch,
) -> Result<(), CanvassError> {
    let id = id.to_string();
    let patch = patch.clone();
    db.connection()
        .call(move |conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(v) = &patch.from_number {
                sets.push("from_number = ?");
                values.push(Box::new(v.clone()));
            }
            if let Some(v) = &patch.display_name {
                sets.push("display_name = ?");
                values.push(Box::new(v.clone()));
            }
            if let Some(v) = &patch.last_message_at {
                sets.push("last_message_at = ?");
                values.push(Box::new(v.clone()));
            }
            if let Some(v) = patch.status {
                sets.push("status = ?");
                values.push(Box::new(v.to_string()));
            }
            if let Some(v) = patch.pinned {
                sets.push("pinned = ?");
                values.push(Box::new(v));
            }
            if let Some(v) = &patch.labels {
                sets.push("labels = ?");
                values.push(Box::new(to_json_list(v)));
            }
            if let Some(v) = patch.manual_override {
                sets.push("manual_override = ?");
                values.push(Box::new(v));
            }

            sets.push("updated_at = ?");
            values.push(Box::new(canvass_core::types::now_rfc3339()));
            values.push(Box::new(id));

            // Positional placeholders are numbered by order of appearance.
            let assignments: Vec<String> = sets
                .iter()
                .enumerate()
                .map(|(i, s)| s.replace('?', &format!("?{}", i + 1)))
                .collect();
            let sql = format!(
                "UPDATE conversations SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len()
            );
            conn.execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}
