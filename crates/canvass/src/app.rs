// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine wiring: config to running components.

use std::sync::Arc;
use std::time::Duration;

use canvass_anthropic::{AnthropicClient, AnthropicGateway};
use canvass_config::CanvassConfig;
use canvass_core::{CanvassError, CompletionGateway, MessagingGateway};
use canvass_engine::{
    CampaignDispatcher, ConversationResolver, FollowupEngine, FollowupScheduler, ScenarioExecutor,
};
use canvass_storage::Database;
use canvass_twilio::TwilioGateway;
use tracing::info;

/// All engine components, wired against one database and live gateways.
pub struct App {
    pub db: Arc<Database>,
    pub dispatcher: Arc<CampaignDispatcher>,
    pub scheduler: FollowupScheduler,
}

impl App {
    /// Open storage, build the gateways from config, and wire the engine.
    pub async fn build(config: &CanvassConfig) -> Result<Self, CanvassError> {
        let db = Arc::new(Database::open(&config.storage.database_path).await?);
        info!(path = %config.storage.database_path, "database opened");

        let messaging: Arc<dyn MessagingGateway> = Arc::new(TwilioGateway::new(
            config.twilio.account_sid.clone(),
            config.twilio.auth_token.clone(),
        )?);
        let completion: Arc<dyn CompletionGateway> =
            Arc::new(AnthropicGateway::new(AnthropicClient::new(
                config.anthropic.api_key.clone(),
                config.anthropic.api_version.clone(),
                config.anthropic.model.clone(),
                config.anthropic.max_tokens,
            )?));

        let resolver = Arc::new(ConversationResolver::new(db.clone()));
        let followups = Arc::new(FollowupEngine::new(db.clone()));
        let executor = Arc::new(ScenarioExecutor::new(
            db.clone(),
            completion,
            messaging.clone(),
            followups,
        ));

        let dispatcher = Arc::new(CampaignDispatcher::new(db.clone(), resolver, messaging));
        let scheduler = FollowupScheduler::new(db.clone(), executor)
            .with_concurrency(config.scheduler.concurrency)
            .with_item_timeout(Duration::from_secs(config.scheduler.item_timeout_secs));

        Ok(Self {
            db,
            dispatcher,
            scheduler,
        })
    }
}
