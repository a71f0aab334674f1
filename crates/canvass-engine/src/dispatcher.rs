// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign dispatch: paced bulk SMS over contact lists.
//!
//! A started campaign runs on its own task. The dispatcher keeps a
//! cancellation token per running campaign; `stop` pauses the row and
//! cancels the token, and the task observes the token between recipients so
//! a stop lands within one message of the request.

use std::collections::HashMap;
use std::sync::Arc;

use canvass_core::types::{
    now_rfc3339, Campaign, CampaignMessage, CampaignMessageStatus, CampaignPatch, Contact,
    ConversationPatch, Direction, Message, MessageStatus,
};
use canvass_core::{CanvassError, MessagingGateway};
use canvass_storage::queries::{campaigns, contacts, conversations, messages};
use canvass_storage::Database;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::resolver::ConversationResolver;

/// Substitute `{tag}` placeholders in a campaign template from a contact.
///
/// Recognized tags are business_name, phone, email, city, state, country.
/// A recognized tag with no value renders as empty; unrecognized braces are
/// left verbatim.
pub fn personalize(template: &str, contact: &Contact) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    template
        .replace("{business_name}", &field(&contact.business_name))
        .replace("{phone}", &contact.phone)
        .replace("{email}", &field(&contact.email))
        .replace("{city}", &field(&contact.city))
        .replace("{state}", &field(&contact.state))
        .replace("{country}", &field(&contact.country))
}

/// Returned by [`CampaignDispatcher::start`] once the run is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReceipt {
    /// Total recipients the run will attempt.
    pub recipients: usize,
}

pub struct CampaignDispatcher {
    db: Arc<Database>,
    resolver: Arc<ConversationResolver>,
    messaging: Arc<dyn MessagingGateway>,
    running: Mutex<HashMap<String, CancellationToken>>,
}

impl CampaignDispatcher {
    pub fn new(
        db: Arc<Database>,
        resolver: Arc<ConversationResolver>,
        messaging: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self {
            db,
            resolver,
            messaging,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Start a draft campaign. Validates, transitions draft -> running
    /// exactly once, and spawns the send loop. Returns the recipient count
    /// once the campaign is running; the loop itself is detached.
    pub async fn start(self: &Arc<Self>, campaign_id: &str) -> Result<StartReceipt, CanvassError> {
        let campaign = campaigns::get_by_id(&self.db, campaign_id)
            .await?
            .ok_or_else(|| {
                CanvassError::Validation(format!("campaign {campaign_id} not found"))
            })?;
        if campaign.message_template.trim().is_empty() {
            return Err(CanvassError::Validation(
                "campaign has an empty message template".to_string(),
            ));
        }
        if campaign.contact_list_ids.is_empty() {
            return Err(CanvassError::Validation(
                "campaign has no contact lists".to_string(),
            ));
        }
        let recipients =
            contacts::get_by_lists(&self.db, &campaign.workspace_id, &campaign.contact_list_ids)
                .await?;

        // The guarded UPDATE is the start gate: a second concurrent start
        // sees zero rows changed and fails here.
        if !campaigns::mark_running(&self.db, campaign_id, &now_rfc3339()).await? {
            return Err(CanvassError::Validation(format!(
                "campaign {campaign_id} is not in draft"
            )));
        }
        info!(campaign_id, recipients = recipients.len(), "campaign started");

        let token = CancellationToken::new();
        self.running
            .lock()
            .await
            .insert(campaign_id.to_string(), token.clone());

        let receipt = StartReceipt {
            recipients: recipients.len(),
        };
        let dispatcher = Arc::clone(self);
        let campaign_id = campaign_id.to_string();
        tokio::spawn(async move {
            dispatcher.run(campaign, recipients, token).await;
            dispatcher.running.lock().await.remove(&campaign_id);
        });
        Ok(receipt)
    }

    /// Pause a running campaign and cancel its send loop.
    pub async fn stop(&self, campaign_id: &str) -> Result<(), CanvassError> {
        if !campaigns::mark_paused(&self.db, campaign_id).await? {
            return Err(CanvassError::Validation(format!(
                "campaign {campaign_id} is not running"
            )));
        }
        if let Some(token) = self.running.lock().await.remove(campaign_id) {
            token.cancel();
        }
        info!(campaign_id, "campaign paused");
        Ok(())
    }

    /// The send loop. One pass over the recipients; per-recipient failures
    /// are recorded and skipped, never fatal. Counts are persisted after
    /// every recipient so a crash or stop loses no tally.
    async fn run(&self, campaign: Campaign, recipients: Vec<Contact>, token: CancellationToken) {
        let mut sent = campaign.sent_count;
        let mut failed = campaign.failed_count;
        let delay = std::time::Duration::from_millis(campaign.delay_between_messages_ms);

        for (i, contact) in recipients.iter().enumerate() {
            if token.is_cancelled() {
                info!(campaign_id = %campaign.id, position = i, "campaign stopped mid-run");
                return;
            }
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
                if token.is_cancelled() {
                    info!(campaign_id = %campaign.id, position = i, "campaign stopped mid-run");
                    return;
                }
            }

            let body = personalize(&campaign.message_template, contact);
            match self.send_one(&campaign, contact, &body).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(
                        campaign_id = %campaign.id,
                        contact_id = %contact.id,
                        error = %e,
                        "campaign send failed"
                    );
                    failed += 1;
                    if let Err(e) = self.record_failure(&campaign, contact, &e).await {
                        warn!(campaign_id = %campaign.id, error = %e, "failure audit write failed");
                    }
                }
            }
            if let Err(e) = campaigns::update(
                &self.db,
                &campaign.id,
                &CampaignPatch {
                    sent_count: Some(sent),
                    failed_count: Some(failed),
                    ..Default::default()
                },
            )
            .await
            {
                warn!(campaign_id = %campaign.id, error = %e, "count update failed");
            }
        }

        // Guarded: a pause that raced the final recipient wins.
        match campaigns::mark_completed(&self.db, &campaign.id, &now_rfc3339()).await {
            Ok(true) => info!(campaign_id = %campaign.id, sent, failed, "campaign completed"),
            Ok(false) => info!(campaign_id = %campaign.id, "campaign no longer running, left as-is"),
            Err(e) => warn!(campaign_id = %campaign.id, error = %e, "completion update failed"),
        }
    }

    /// One recipient: resolve the conversation, send, commit message rows.
    async fn send_one(
        &self,
        campaign: &Campaign,
        contact: &Contact,
        body: &str,
    ) -> Result<(), CanvassError> {
        let conversation = self
            .resolver
            .resolve(
                &campaign.workspace_id,
                &contact.phone,
                &campaign.sender_number,
                "campaign",
            )
            .await?;
        let receipt = self
            .messaging
            .send_sms(&conversation.from_number, &conversation.phone_number, body)
            .await?;

        let now = now_rfc3339();
        messages::insert(
            &self.db,
            &Message {
                id: uuid::Uuid::new_v4().to_string(),
                conversation_id: conversation.id.clone(),
                direction: Direction::Outbound,
                from_number: conversation.from_number.clone(),
                to_number: conversation.phone_number.clone(),
                body: body.to_string(),
                provider_message_id: Some(receipt.provider_message_id),
                status: MessageStatus::Sending,
                tokens_used: None,
                model: None,
                processing_ms: None,
                created_at: now.clone(),
            },
        )
        .await?;
        conversations::update(
            &self.db,
            &conversation.id,
            &ConversationPatch {
                last_message_at: Some(now.clone()),
                ..Default::default()
            },
        )
        .await?;
        campaigns::insert_campaign_message(
            &self.db,
            &CampaignMessage {
                id: uuid::Uuid::new_v4().to_string(),
                campaign_id: campaign.id.clone(),
                contact_id: contact.id.clone(),
                phone_number: conversation.phone_number.clone(),
                status: CampaignMessageStatus::Sent,
                error_message: None,
                created_at: now,
            },
        )
        .await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        campaign: &Campaign,
        contact: &Contact,
        error: &CanvassError,
    ) -> Result<(), CanvassError> {
        campaigns::insert_campaign_message(
            &self.db,
            &CampaignMessage {
                id: uuid::Uuid::new_v4().to_string(),
                campaign_id: campaign.id.clone(),
                contact_id: contact.id.clone(),
                phone_number: canvass_core::phone::normalize(&contact.phone),
                status: CampaignMessageStatus::Failed,
                error_message: Some(error.to_string()),
                created_at: now_rfc3339(),
            },
        )
        .await
    }

    /// True while the campaign's send loop is alive. Test hook and status
    /// probe.
    pub async fn is_running(&self, campaign_id: &str) -> bool {
        self.running.lock().await.contains_key(campaign_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_core::types::CampaignStatus;
    use canvass_test_utils::MockMessaging;
    use tempfile::tempdir;

    fn make_contact(id: &str, list: &str, phone: &str, name: Option<&str>) -> Contact {
        Contact {
            id: id.to_string(),
            workspace_id: "ws-1".to_string(),
            list_id: list.to_string(),
            business_name: name.map(str::to_string),
            phone: phone.to_string(),
            email: None,
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            country: None,
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn personalize_fills_known_tags_and_blanks_missing() {
        let contact = make_contact("c-1", "l-1", "+15550100100", Some("Acme Plumbing"));
        let out = personalize(
            "Hi {business_name} in {city}, {state}{country} - re {unknown}",
            &contact,
        );
        assert_eq!(out, "Hi Acme Plumbing in Austin, TX - re {unknown}");
    }

    struct Harness {
        db: Arc<Database>,
        messaging: Arc<MockMessaging>,
        dispatcher: Arc<CampaignDispatcher>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let db = Arc::new(
            Database::open(dir.path().join("dispatcher.db").to_str().unwrap())
                .await
                .unwrap(),
        );
        let messaging = MockMessaging::new();
        let resolver = Arc::new(ConversationResolver::new(db.clone()));
        let dispatcher = Arc::new(CampaignDispatcher::new(
            db.clone(),
            resolver,
            messaging.clone(),
        ));
        Harness {
            db,
            messaging,
            dispatcher,
            _dir: dir,
        }
    }

    fn make_campaign(id: &str, lists: Vec<&str>, delay_ms: u64) -> Campaign {
        Campaign {
            id: id.to_string(),
            workspace_id: "ws-1".to_string(),
            message_template: "Hi {business_name}!".to_string(),
            sender_number: "+15550100001".to_string(),
            contact_list_ids: lists.into_iter().map(str::to_string).collect(),
            delay_between_messages_ms: delay_ms,
            status: CampaignStatus::Draft,
            sent_count: 0,
            failed_count: 0,
            started_at: None,
            completed_at: None,
            created_at: now_rfc3339(),
        }
    }

    async fn wait_for_finish(h: &Harness, campaign_id: &str) -> Campaign {
        for _ in 0..200 {
            if !h.dispatcher.is_running(campaign_id).await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        campaigns::get_by_id(&h.db, campaign_id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn dispatch_sends_to_all_and_completes() {
        let h = harness().await;
        for i in 0..3 {
            contacts::insert(
                &h.db,
                &make_contact(
                    &format!("c-{i}"),
                    "l-1",
                    &format!("+1555010010{i}"),
                    Some(&format!("Biz {i}")),
                ),
            )
            .await
            .unwrap();
        }
        let campaign = make_campaign("camp-1", vec!["l-1"], 0);
        campaigns::insert(&h.db, &campaign).await.unwrap();

        let receipt = h.dispatcher.start("camp-1").await.unwrap();
        assert_eq!(receipt.recipients, 3);
        let done = wait_for_finish(&h, "camp-1").await;

        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.sent_count, 3);
        assert_eq!(done.failed_count, 0);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        let sent = h.messaging.sent().await;
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().any(|s| s.body == "Hi Biz 0!"));

        let audit = campaigns::list_campaign_messages(&h.db, "camp-1").await.unwrap();
        assert_eq!(audit.len(), 3);
        assert!(audit
            .iter()
            .all(|m| m.status == CampaignMessageStatus::Sent));
    }

    #[tokio::test]
    async fn one_bad_recipient_does_not_abort_the_run() {
        let h = harness().await;
        contacts::insert(&h.db, &make_contact("c-0", "l-1", "+15550100100", None))
            .await
            .unwrap();
        contacts::insert(&h.db, &make_contact("c-1", "l-1", "+15550100101", None))
            .await
            .unwrap();
        h.messaging.fail_for("+15550100100").await;

        let campaign = make_campaign("camp-1", vec!["l-1"], 0);
        campaigns::insert(&h.db, &campaign).await.unwrap();
        h.dispatcher.start("camp-1").await.unwrap();
        let done = wait_for_finish(&h, "camp-1").await;

        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.sent_count, 1);
        assert_eq!(done.failed_count, 1);

        let audit = campaigns::list_campaign_messages(&h.db, "camp-1").await.unwrap();
        let failed: Vec<_> = audit
            .iter()
            .filter(|m| m.status == CampaignMessageStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error_message.is_some());
    }

    #[tokio::test]
    async fn blank_phone_is_a_recorded_failure_not_a_send() {
        let h = harness().await;
        contacts::insert(&h.db, &make_contact("c-0", "l-1", "", None))
            .await
            .unwrap();
        contacts::insert(&h.db, &make_contact("c-1", "l-1", "+15550100101", None))
            .await
            .unwrap();

        let campaign = make_campaign("camp-1", vec!["l-1"], 0);
        campaigns::insert(&h.db, &campaign).await.unwrap();
        h.dispatcher.start("camp-1").await.unwrap();
        let done = wait_for_finish(&h, "camp-1").await;

        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.sent_count, 1);
        assert_eq!(done.failed_count, 1);

        // The degenerate number never reached the provider.
        let sent = h.messaging.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "+15550100101");

        let audit = campaigns::list_campaign_messages(&h.db, "camp-1").await.unwrap();
        let failed = audit
            .iter()
            .find(|m| m.status == CampaignMessageStatus::Failed)
            .unwrap();
        assert_eq!(failed.contact_id, "c-0");
        assert!(failed.error_message.as_deref().unwrap().contains("no digits"));
    }

    #[tokio::test]
    async fn start_is_exactly_once() {
        let h = harness().await;
        contacts::insert(&h.db, &make_contact("c-0", "l-1", "+15550100100", None))
            .await
            .unwrap();
        let campaign = make_campaign("camp-1", vec!["l-1"], 0);
        campaigns::insert(&h.db, &campaign).await.unwrap();

        h.dispatcher.start("camp-1").await.unwrap();
        let second = h.dispatcher.start("camp-1").await;
        assert!(matches!(second, Err(CanvassError::Validation(_))));
        wait_for_finish(&h, "camp-1").await;
    }

    #[tokio::test]
    async fn start_rejects_empty_template_and_lists() {
        let h = harness().await;
        let mut campaign = make_campaign("camp-1", vec!["l-1"], 0);
        campaign.message_template = "   ".to_string();
        campaigns::insert(&h.db, &campaign).await.unwrap();
        assert!(matches!(
            h.dispatcher.start("camp-1").await,
            Err(CanvassError::Validation(_))
        ));

        let campaign = make_campaign("camp-2", vec![], 0);
        campaigns::insert(&h.db, &campaign).await.unwrap();
        assert!(matches!(
            h.dispatcher.start("camp-2").await,
            Err(CanvassError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stop_pauses_mid_run_and_preserves_counts() {
        let h = harness().await;
        for i in 0..5 {
            contacts::insert(
                &h.db,
                &make_contact(&format!("c-{i}"), "l-1", &format!("+1555010010{i}"), None),
            )
            .await
            .unwrap();
        }
        // Long pacing so the run is still alive when stop lands.
        let campaign = make_campaign("camp-1", vec!["l-1"], 200);
        campaigns::insert(&h.db, &campaign).await.unwrap();

        h.dispatcher.start("camp-1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        h.dispatcher.stop("camp-1").await.unwrap();
        wait_for_finish(&h, "camp-1").await;

        let stored = campaigns::get_by_id(&h.db, "camp-1").await.unwrap().unwrap();
        // Paused stays paused; the loop's completion update is guarded out.
        assert_eq!(stored.status, CampaignStatus::Paused);
        assert!(stored.sent_count < 5);
        let audit = campaigns::list_campaign_messages(&h.db, "camp-1").await.unwrap();
        assert_eq!(audit.len() as u32, stored.sent_count + stored.failed_count);
    }

    #[tokio::test]
    async fn stop_rejects_non_running_campaign() {
        let h = harness().await;
        let campaign = make_campaign("camp-1", vec!["l-1"], 0);
        campaigns::insert(&h.db, &campaign).await.unwrap();
        assert!(matches!(
            h.dispatcher.stop("camp-1").await,
            Err(CanvassError::Validation(_))
        ));
    }
}
