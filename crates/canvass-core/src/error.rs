// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Canvass outreach engine.

use thiserror::Error;

/// The primary error type used across all Canvass gateways and engine operations.
#[derive(Debug, Error)]
pub enum CanvassError {
    /// Malformed input rejected before any side effect (empty template,
    /// non-draft campaign start, unknown contact list).
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend errors other than the handled unique-constraint race
    /// (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// SMS transport errors (provider rejection, network failure, rate limiting).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Completion model errors (API failure, token limits, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out. Treated as the failing call's failure branch.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CanvassError {
    /// Wrap an arbitrary error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CanvassError::Storage {
            source: Box::new(source),
        }
    }
}
