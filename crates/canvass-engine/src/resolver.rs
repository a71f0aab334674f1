// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent find-or-create of the single conversation for a phone pair.

use std::sync::Arc;

use canvass_core::phone;
use canvass_core::types::{now_rfc3339, Conversation, ConversationPatch, ConversationStatus};
use canvass_core::CanvassError;
use canvass_storage::queries::conversations;
use canvass_storage::{ConditionalInsert, Database};
use tracing::debug;

/// Resolves the one conversation for an external phone number.
///
/// Guarantee: exactly one conversation ever exists per normalized external
/// number within a workspace; concurrent resolution for the same number
/// converges on the same row via the storage UNIQUE guard.
///
/// Note the `from_number` side effect: when a known number is addressed
/// through a different owned number, the existing row's `from_number` is
/// overwritten in place. History is replaced, not merged. A contact is
/// always addressed through the currently-active owned number.
pub struct ConversationResolver {
    db: Arc<Database>,
}

impl ConversationResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find or create the conversation for (recipient, sender).
    ///
    /// `recipient_raw` is the external party, `sender_raw` the owned number;
    /// both are normalized before any lookup.
    pub async fn resolve(
        &self,
        workspace_id: &str,
        recipient_raw: &str,
        sender_raw: &str,
        creator_id: &str,
    ) -> Result<Conversation, CanvassError> {
        if !phone::is_dialable(recipient_raw) {
            return Err(CanvassError::Validation(format!(
                "recipient phone number {recipient_raw:?} contains no digits"
            )));
        }
        let recipient = phone::normalize(recipient_raw);
        let sender = phone::normalize(sender_raw);

        if let Some(existing) =
            conversations::get_by_phone(&self.db, workspace_id, &recipient).await?
        {
            if existing.from_number != sender {
                debug!(
                    conversation_id = %existing.id,
                    old = %existing.from_number,
                    new = %sender,
                    "rewriting conversation from_number"
                );
                conversations::update(
                    &self.db,
                    &existing.id,
                    &ConversationPatch {
                        from_number: Some(sender.clone()),
                        ..Default::default()
                    },
                )
                .await?;
                return Ok(Conversation {
                    from_number: sender,
                    ..existing
                });
            }
            return Ok(existing);
        }

        let now = now_rfc3339();
        let candidate = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            phone_number: recipient.clone(),
            from_number: sender,
            display_name: None,
            last_message_at: None,
            status: ConversationStatus::Open,
            pinned: false,
            labels: Vec::new(),
            manual_override: false,
            created_by: creator_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        match conversations::insert(&self.db, &candidate).await? {
            ConditionalInsert::Inserted => Ok(candidate),
            ConditionalInsert::DuplicateKey => {
                // A concurrent resolver created the row between our lookup
                // and insert. Converge on that row instead of failing.
                debug!(phone = %recipient, "conversation insert raced, re-fetching");
                conversations::get_by_phone(&self.db, workspace_id, &recipient)
                    .await?
                    .ok_or_else(|| {
                        CanvassError::Internal(format!(
                            "conversation for {recipient} vanished after duplicate insert"
                        ))
                    })
            }
        }
    }
}
