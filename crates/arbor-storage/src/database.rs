// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::sync::Once;

use arbor_core::ArborError;
use tracing::debug;

use crate::migrations::run_migrations;

static VEC_EXTENSION: Once = Once::new();

/// Register sqlite-vec for every connection opened by this process.
///
/// Must run before the first connection is opened.
fn register_vec_extension() {
    VEC_EXTENSION.call_once(|| {
        // SAFETY: `sqlite3_vec_init` has the signature SQLite expects of an
        // auto-extension entry point; the transmute only erases it to the
        // generic pointer type rusqlite's binding declares.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

/// Handle to the Arbor SQLite database. This is the single writer.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run pending
    /// migrations.
    pub async fn open(path: &str) -> Result<Self, ArborError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, ArborError> {
        register_vec_extension();

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ArborError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_sqlite_err)?;

        conn.call(move |conn| -> Result<Result<(), ArborError>, rusqlite::Error> {
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update_and_check(None, "journal_mode", journal, |_| Ok(()))?;
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the connection, waiting for queued statements to finish.
    pub async fn close(self) -> Result<(), ArborError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Convert a tokio-rusqlite error into a storage error.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> ArborError {
    ArborError::Storage {
        source: Box::new(e),
    }
}

/// Convert a rusqlite error raised outside a `call` closure.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> ArborError {
    ArborError::Storage {
        source: Box::new(e),
    }
}
