// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Canvass.
//!
//! TOML configuration with strict parsing (`deny_unknown_fields`), XDG file
//! hierarchy lookup, and `CANVASS_*` environment variable overrides.

pub mod loader;
pub mod model;

use canvass_core::CanvassError;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CanvassConfig;

/// Load configuration from the XDG hierarchy and validate it for running
/// the engine against live providers.
pub fn load_and_validate() -> Result<CanvassConfig, CanvassError> {
    let config =
        load_config().map_err(|e| CanvassError::Config(format!("config load failed: {e}")))?;
    validate(&config)?;
    Ok(config)
}

/// Credential and range checks that deserialization cannot express.
pub fn validate(config: &CanvassConfig) -> Result<(), CanvassError> {
    if config.twilio.account_sid.is_empty() {
        return Err(CanvassError::Config(
            "twilio.account_sid is not set (CANVASS_TWILIO_ACCOUNT_SID)".to_string(),
        ));
    }
    if config.twilio.auth_token.is_empty() {
        return Err(CanvassError::Config(
            "twilio.auth_token is not set (CANVASS_TWILIO_AUTH_TOKEN)".to_string(),
        ));
    }
    if config.anthropic.api_key.is_empty() {
        return Err(CanvassError::Config(
            "anthropic.api_key is not set (CANVASS_ANTHROPIC_API_KEY)".to_string(),
        ));
    }
    if config.anthropic.max_tokens == 0 {
        return Err(CanvassError::Config(
            "anthropic.max_tokens must be positive".to_string(),
        ));
    }
    if config.scheduler.concurrency == 0 {
        return Err(CanvassError::Config(
            "scheduler.concurrency must be positive".to_string(),
        ));
    }
    Ok(())
}
