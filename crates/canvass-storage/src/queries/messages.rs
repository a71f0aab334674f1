// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use canvass_core::CanvassError;
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};
use crate::models::Message;
use crate::queries::parse_col;

const COLUMNS: &str = "id, conversation_id, direction, from_number, to_number, body, \
     provider_message_id, status, tokens_used, model, processing_ms, created_at";

fn map_row(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        direction: parse_col(2, row.get::<_, String>(2)?)?,
        from_number: row.get(3)?,
        to_number: row.get(4)?,
        body: row.get(5)?,
        provider_message_id: row.get(6)?,
        status: parse_col(7, row.get::<_, String>(7)?)?,
        tokens_used: row.get(8)?,
        model: row.get(9)?,
        processing_ms: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Insert a new message.
pub async fn insert(db: &Database, msg: &Message) -> Result<(), CanvassError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages
                 (id, conversation_id, direction, from_number, to_number, body,
                  provider_message_id, status, tokens_used, model, processing_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.direction.to_string(),
                    msg.from_number,
                    msg.to_number,
                    msg.body,
                    msg.provider_message_id,
                    msg.status.to_string(),
                    msg.tokens_used,
                    msg.model,
                    msg.processing_ms,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// Full message history for a conversation in chronological order.
pub async fn get_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, CanvassError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE conversation_id = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], map_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent inbound message for a conversation, if any.
///
/// Used for the stop-keyword check and as the synthetic follow-up trigger.
pub async fn last_inbound(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Message>, CanvassError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND direction = 'inbound'
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![conversation_id], map_row);
            match result {
                Ok(msg) => Ok(Some(msg)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}
