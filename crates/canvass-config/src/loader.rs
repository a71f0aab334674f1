// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./canvass.toml` > `~/.config/canvass/canvass.toml`
//! > `/etc/canvass/canvass.toml` with environment variable overrides via the
//! `CANVASS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CanvassConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/canvass/canvass.toml` (system-wide)
/// 3. `~/.config/canvass/canvass.toml` (user XDG config)
/// 4. `./canvass.toml` (local directory)
/// 5. `CANVASS_*` environment variables
pub fn load_config() -> Result<CanvassConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CanvassConfig::default()))
        .merge(Toml::file("/etc/canvass/canvass.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("canvass/canvass.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("canvass.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from inline TOML only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CanvassConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CanvassConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CanvassConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CanvassConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CANVASS_TWILIO_ACCOUNT_SID` must map to
/// `twilio.account_sid`, not `twilio.account.sid`.
fn env_provider() -> Env {
    Env::prefixed("CANVASS_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("engine_", "engine.", 1)
            .replacen("twilio_", "twilio.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("scheduler_", "scheduler.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [storage]
            database_path = "/var/lib/canvass/canvass.db"

            [scheduler]
            sweep_interval_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.database_path, "/var/lib/canvass/canvass.db");
        assert_eq!(config.scheduler.sweep_interval_secs, 15);
        // Untouched sections keep their defaults.
        assert_eq!(config.anthropic.max_tokens, 1024);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [storage]
            databse_path = "typo.db"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn env_vars_override_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "canvass.toml",
                r#"
                [twilio]
                account_sid = "AC_from_file"
                "#,
            )?;
            jail.set_env("CANVASS_TWILIO_ACCOUNT_SID", "AC_from_env");
            jail.set_env("CANVASS_ANTHROPIC_MAX_TOKENS", "2048");

            let config: CanvassConfig = Figment::new()
                .merge(Serialized::defaults(CanvassConfig::default()))
                .merge(Toml::file("canvass.toml"))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.twilio.account_sid, "AC_from_env");
            assert_eq!(config.anthropic.max_tokens, 2048);
            Ok(())
        });
    }
}
