// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `canvass-core::types` for use across
//! crate boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use canvass_core::types::{
    Campaign, CampaignMessage, CampaignMessageStatus, CampaignPatch, CampaignStatus, Contact,
    Conversation, ConversationPatch, ConversationStatus, Direction, FollowupStage, FollowupState,
    FollowupStatePatch, InboundSms, Message, MessageStatus, Scenario, ScenarioExecution,
    WaitUnit,
};
