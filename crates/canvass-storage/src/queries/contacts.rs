// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact queries. Contacts are imported out of band; the engine only
//! reads them to enumerate campaign recipients.

use canvass_core::CanvassError;
use rusqlite::{params, params_from_iter, Row};

use crate::database::{map_tr_err, Database};
use crate::models::Contact;

const COLUMNS: &str = "id, workspace_id, list_id, business_name, phone, email, \
     city, state, country, created_at";

fn map_row(row: &Row<'_>) -> Result<Contact, rusqlite::Error> {
    Ok(Contact {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        list_id: row.get(2)?,
        business_name: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        city: row.get(6)?,
        state: row.get(7)?,
        country: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a contact row.
pub async fn insert(db: &Database, contact: &Contact) -> Result<(), CanvassError> {
    let contact = contact.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts
                 (id, workspace_id, list_id, business_name, phone, email,
                  city, state, country, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    contact.id,
                    contact.workspace_id,
                    contact.list_id,
                    contact.business_name,
                    contact.phone,
                    contact.email,
                    contact.city,
                    contact.state,
                    contact.country,
                    contact.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err::<rusqlite::Error>)
}

/// All contacts in any of the given lists, tenant-scoped.
pub async fn get_by_lists(
    db: &Database,
    workspace_id: &str,
    list_ids: &[String],
) -> Result<Vec<Contact>, CanvassError> {
    if list_ids.is_empty() {
        return Ok(Vec::new());
    }
    let workspace_id = workspace_id.to_string();
    let list_ids = list_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let placeholders: Vec<String> = (0..list_ids.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            let sql = format!(
                "SELECT {COLUMNS} FROM contacts
                 WHERE workspace_id = ?1 AND list_id IN ({})
                 ORDER BY created_at ASC",
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut values: Vec<&dyn rusqlite::ToSql> = vec![&workspace_id];
            for id in &list_ids {
                values.push(id);
            }
            let rows = stmt.query_map(params_from_iter(values), map_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
