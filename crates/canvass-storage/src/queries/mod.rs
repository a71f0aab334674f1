// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity family.
//!
//! Every function takes `&Database` and runs its statements on the single
//! background writer thread via `conn.call()`. Status enums and JSON columns
//! are converted at this boundary so callers only see domain types.

pub mod campaigns;
pub mod contacts;
pub mod conversations;
pub mod executions;
pub mod followups;
pub mod messages;
pub mod scenarios;

/// Outcome of a conditional insert guarded by a UNIQUE constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalInsert {
    /// The row was inserted.
    Inserted,
    /// A concurrent writer inserted the same key first. Callers re-fetch.
    DuplicateKey,
}

/// Parse a TEXT column into an enum, mapping failures to a rusqlite
/// conversion error so they surface as storage errors.
pub(crate) fn parse_col<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a JSON array column into a `Vec<String>`.
pub(crate) fn parse_json_list(idx: usize, value: String) -> Result<Vec<String>, rusqlite::Error> {
    serde_json::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Serialize a string list to its JSON column representation.
pub(crate) fn to_json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}
