// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Canvass configuration.
///
/// Loaded from TOML files with environment variable overrides. All sections
/// are optional and default to sensible values; credentials default to empty
/// and are validated at startup.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CanvassConfig {
    /// Engine-wide settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Twilio credentials.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Follow-up scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Default workspace id for single-tenant deployments.
    #[serde(default = "default_workspace")]
    pub workspace_id: String,

    /// Log filter directive, overridable via `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_id: default_workspace(),
            log_level: default_log_level(),
        }
    }
}

fn default_workspace() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TwilioConfig {
    /// Account SID (`AC...`).
    #[serde(default)]
    pub account_sid: String,

    /// Auth token.
    #[serde(default)]
    pub auth_token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// API key (`sk-ant-...`).
    #[serde(default)]
    pub api_key: String,

    /// API version header value.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Model identifier for scenario turns.
    #[serde(default = "default_model")]
    pub model: String,

    /// Generation cap per turn. SMS replies are short.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_version: default_api_version(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "canvass.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between sweep passes.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Concurrent AI turns within a sweep.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-item timeout within a sweep, in seconds.
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            concurrency: default_concurrency(),
            item_timeout_secs: default_item_timeout(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

fn default_item_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = CanvassConfig::default();
        assert_eq!(config.engine.workspace_id, "default");
        assert_eq!(config.anthropic.api_version, "2023-06-01");
        assert_eq!(config.anthropic.max_tokens, 1024);
        assert_eq!(config.storage.database_path, "canvass.db");
        assert_eq!(config.scheduler.sweep_interval_secs, 60);
        assert!(config.twilio.account_sid.is_empty());
    }
}
