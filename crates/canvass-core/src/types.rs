// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types shared across the Canvass workspace.
//!
//! All timestamps are RFC 3339 UTC strings (`%Y-%m-%dT%H:%M:%S%.3fZ`), which
//! compare correctly as text in SQLite. Set-valued columns (labels, contact
//! list ids, stop keywords) are stored as JSON arrays.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Produce the current UTC time in the canonical storage format.
pub fn now_rfc3339() -> String {
    format_rfc3339(&chrono::Utc::now())
}

/// Format any UTC instant in the canonical storage format.
pub fn format_rfc3339(instant: &chrono::DateTime<chrono::Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Direction of a message relative to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Failed,
    Read,
}

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
    Done,
    Archived,
}

/// Lifecycle status of a campaign. `Paused` is terminal: there is no
/// resumption path, a re-start requires a fresh draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Running,
    Completed,
    Paused,
}

/// Outcome of one per-contact campaign send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignMessageStatus {
    Sent,
    Failed,
}

/// Outcome of one AI-turn attempt, recorded in the execution audit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Processing,
    Success,
    NoReply,
    HumanNeeded,
    SkippedBusinessHours,
    Failed,
}

/// Unit for a follow-up stage's wait duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WaitUnit {
    Minutes,
    Hours,
    Days,
}

impl WaitUnit {
    /// Convert a duration in this unit to a chrono duration.
    ///
    /// Returns `None` when the amount overflows chrono's representable
    /// range, so a corrupt stored wait never panics a caller.
    pub fn to_duration(self, amount: i64) -> Option<chrono::Duration> {
        match self {
            WaitUnit::Minutes => chrono::Duration::try_minutes(amount),
            WaitUnit::Hours => chrono::Duration::try_hours(amount),
            WaitUnit::Days => chrono::Duration::try_days(amount),
        }
    }
}

/// A single thread with one external phone number.
///
/// Identity is the external `phone_number`: at most one conversation exists
/// per external number, regardless of which owned number is in use. When a
/// send targets a known number through a different owned number, `from_number`
/// is overwritten in place (not merged, not duplicated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub workspace_id: String,
    /// The external party's number, canonical form. Unique per workspace.
    pub phone_number: String,
    /// The owned number currently used to address this party.
    pub from_number: String,
    pub display_name: Option<String>,
    pub last_message_at: Option<String>,
    pub status: ConversationStatus,
    pub pinned: bool,
    /// Free-form labels with set semantics.
    pub labels: Vec<String>,
    /// When true, all automated responses are suppressed until cleared.
    pub manual_override: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for a conversation. `None` means "leave the field alone",
/// which is distinct from setting a field to an empty value.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub from_number: Option<String>,
    pub display_name: Option<String>,
    pub last_message_at: Option<String>,
    pub status: Option<ConversationStatus>,
    pub pinned: Option<bool>,
    pub labels: Option<Vec<String>>,
    pub manual_override: Option<bool>,
}

/// One SMS message belonging to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub from_number: String,
    pub to_number: String,
    pub body: String,
    /// Provider-assigned id, null until the provider accepts the send.
    pub provider_message_id: Option<String>,
    pub status: MessageStatus,
    /// Token count when the body was authored by the executor.
    pub tokens_used: Option<u32>,
    pub model: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: String,
}

/// A contact imported into a list, source of template personalization fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub workspace_id: String,
    pub list_id: String,
    pub business_name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub created_at: String,
}

/// One bulk-send job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub workspace_id: String,
    /// Template with `{tag}` placeholders, personalized per contact.
    pub message_template: String,
    pub sender_number: String,
    pub contact_list_ids: Vec<String>,
    /// Pacing delay between recipients, in milliseconds.
    pub delay_between_messages_ms: u64,
    pub status: CampaignStatus,
    pub sent_count: u32,
    pub failed_count: u32,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// Partial update for a campaign row.
#[derive(Debug, Clone, Default)]
pub struct CampaignPatch {
    pub status: Option<CampaignStatus>,
    pub sent_count: Option<u32>,
    pub failed_count: Option<u32>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Append-only audit row for one (campaign, contact) send attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignMessage {
    pub id: String,
    pub campaign_id: String,
    pub contact_id: String,
    pub phone_number: String,
    pub status: CampaignMessageStatus,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Business-hours window for a scenario, as local time-of-day in the
/// configured timezone. The range is half-open [start, end) and does not
/// handle windows crossing midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    /// Start of the window, "HH:MM".
    pub start: String,
    /// End of the window, "HH:MM", exclusive.
    pub end: String,
    /// IANA timezone name, e.g. "America/New_York".
    pub timezone: String,
}

/// A configured AI persona assignable to owned phone numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    /// Base system instructions for the completion model.
    pub instructions: String,
    pub active: bool,
    pub max_followup_attempts: u32,
    /// When present, the executor only responds inside this window.
    pub business_hours: Option<BusinessHours>,
    /// Override for the stop-keyword set; `None` uses the default set.
    pub stop_keywords: Option<Vec<String>>,
    pub created_at: String,
}

/// Per-(conversation, scenario) follow-up state machine row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupState {
    pub id: String,
    pub conversation_id: String,
    pub scenario_id: String,
    /// 0 = initial send, increments on each follow-up sent.
    pub current_stage: u32,
    pub total_attempts: u32,
    /// One-way latch. Set by max attempts, a stop keyword, or manual override.
    pub stopped: bool,
    pub next_followup_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Partial update for a follow-up state row.
///
/// `next_followup_at` is doubly optional: `None` leaves the column alone,
/// `Some(None)` clears it to NULL, `Some(Some(t))` sets it.
#[derive(Debug, Clone, Default)]
pub struct FollowupStatePatch {
    pub current_stage: Option<u32>,
    pub total_attempts: Option<u32>,
    pub stopped: Option<bool>,
    pub next_followup_at: Option<Option<String>>,
}

/// Static stage configuration for a scenario's re-engagement schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupStage {
    pub scenario_id: String,
    pub stage_number: u32,
    pub wait_duration: i64,
    pub wait_unit: WaitUnit,
    /// Stage-specific instructions appended to the scenario's base instructions.
    pub instructions: Option<String>,
}

/// Append-only log row for one AI-turn attempt. Written exactly once per
/// executor call, on every branch; never read back for decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioExecution {
    pub id: String,
    pub conversation_id: String,
    pub scenario_id: String,
    pub trigger_body: String,
    pub prompt: String,
    pub response: Option<String>,
    pub tokens_used: Option<u32>,
    pub model: Option<String>,
    pub processing_ms: Option<i64>,
    pub execution_status: ExecutionStatus,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// An inbound SMS event delivered to the engine by the webhook layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundSms {
    pub from_number: String,
    pub to_number: String,
    pub body: String,
    pub received_at: String,
}
