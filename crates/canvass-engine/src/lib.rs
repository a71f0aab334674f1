// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orchestration engine for Canvass.
//!
//! Ties the storage layer and the messaging/completion gateways together
//! into the four moving parts of the system:
//!
//! - [`CampaignDispatcher`]: paced bulk sends over contact lists
//! - [`InboundProcessor`]: the reply pipeline for incoming SMS
//! - [`ScenarioExecutor`]: one AI turn, gated and audited
//! - [`FollowupScheduler`]: the periodic sweep over due follow-ups

pub mod dispatcher;
pub mod executor;
pub mod followup;
pub mod inbound;
pub mod matcher;
pub mod resolver;
pub mod scheduler;

pub use dispatcher::{personalize, CampaignDispatcher, StartReceipt};
pub use executor::{
    ExecutionOutcome, FollowupContext, ScenarioExecutor, HANDOFF_MESSAGE, NEED_HUMAN_LABEL,
    SENTINEL_RULES,
};
pub use followup::{FollowupEngine, TurnActor, DEFAULT_STOP_KEYWORDS};
pub use inbound::{InboundDisposition, InboundProcessor};
pub use matcher::ScenarioMatcher;
pub use resolver::ConversationResolver;
pub use scheduler::{FollowupScheduler, SweepReport, DEFAULT_SWEEP_CONCURRENCY};
