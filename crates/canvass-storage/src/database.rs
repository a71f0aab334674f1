// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use canvass_core::CanvassError;
use tracing::debug;

/// Handle to the single SQLite connection for a workspace database.
///
/// Query modules accept `&Database` and run their statements through
/// [`Database::connection`], which serializes everything on one background
/// thread and eliminates SQLITE_BUSY under concurrent access.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, CanvassError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(tokio_rusqlite::Error::from)
            .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| crate::migrations::run_migrations(conn))
            .await
            .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and flush pending writes.
    pub async fn close(&self) -> Result<(), CanvassError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into `CanvassError::Storage`.
pub(crate) fn map_tr_err<E>(e: tokio_rusqlite::Error<E>) -> CanvassError
where
    E: std::error::Error + Send + Sync + 'static,
{
    CanvassError::Storage {
        source: Box::new(e),
    }
}

/// True when the rusqlite error is a UNIQUE constraint violation.
///
/// This is the one storage error the engine handles rather than propagates:
/// the conversation resolver and the follow-up engine treat it as "a
/// concurrent writer got there first" and re-fetch.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(info, _)
            if info.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
