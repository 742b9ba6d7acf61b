// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; query modules accept `&Database` and go through `connection().call()`.
//! Do not create additional `Connection` instances for writes.

use courier_core::CourierError;
use tracing::debug;
use uuid::Uuid;

/// Timestamps are stored as UTC text in a fixed-width, lexicographically
/// sortable format, so due-time comparisons work on the raw column value.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub(crate) fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(
    text: &str,
) -> Result<chrono::DateTime<chrono::Utc>, chrono::ParseError> {
    chrono::NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Wraps a column-value conversion error (bad timestamp or status text) as a
/// rusqlite error so it can cross the `call` boundary with `?`.
pub(crate) fn column_conversion_err(
    index: usize,
    source: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(source))
}

/// Map a tokio-rusqlite error into the Courier error taxonomy.
///
/// Constraint failures are surfaced as their own variant because they signal
/// a logic bug rather than an I/O problem.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error) -> CourierError {
    match err {
        tokio_rusqlite::Error::Rusqlite(inner) => map_sqlite_err(inner),
        other => CourierError::Storage {
            source: Box::new(other),
        },
    }
}

fn map_sqlite_err(err: rusqlite::Error) -> CourierError {
    match &err {
        rusqlite::Error::SqliteFailure(ffi_err, _)
            if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            CourierError::ConstraintViolation(err.to_string())
        }
        _ => CourierError::Storage {
            source: Box::new(err),
        },
    }
}

/// Handle to the Courier SQLite database.
///
/// Owns the single background writer connection and this database's
/// persistent instance identifier. Opening runs migrations and, on first
/// open, mints the instance UUID that becomes part of every MessageId.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    instance_id: Uuid,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled.
    pub async fn open(path: &str) -> Result<Self, CourierError> {
        Self::open_with(path, true).await
    }

    /// Open (or create) the database at `path`, choosing the journal mode.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        let instance_text = conn
            .call(move |conn| {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;
                conn.pragma_update(None, "foreign_keys", "ON")?;

                crate::migrations::run_migrations(conn)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

                let existing = match conn.query_row(
                    "SELECT instance_id FROM instance WHERE id = 1",
                    [],
                    |row| row.get::<_, String>(0),
                ) {
                    Ok(id) => Some(id),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                };

                match existing {
                    Some(id) => Ok(id),
                    None => {
                        let id = Uuid::new_v4().to_string();
                        conn.execute(
                            "INSERT INTO instance (id, instance_id) VALUES (1, ?1)",
                            [&id],
                        )?;
                        Ok(id)
                    }
                }
            })
            .await
            .map_err(map_tr_err)?;

        let instance_id = Uuid::parse_str(&instance_text).map_err(|e| CourierError::Storage {
            source: Box::new(e),
        })?;

        debug!(path, %instance_id, "database opened");
        Ok(Self { conn, instance_id })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// This database's persistent instance identifier.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        debug!("database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("open_test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn instance_id_is_stable_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("instance_test.db");

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let first = db.instance_id();
        db.close().await.unwrap();

        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert_eq!(first, db.instance_id());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_without_wal_works() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("rollback_journal.db");
        let db = Database::open_with(db_path.to_str().unwrap(), false)
            .await
            .unwrap();
        db.close().await.unwrap();
    }

    #[test]
    fn timestamps_round_trip_and_sort_lexicographically() {
        let earlier = chrono::DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let later = earlier + chrono::Duration::seconds(90);

        let a = format_timestamp(earlier);
        let b = format_timestamp(later);
        assert!(a < b, "text order must match chronological order");

        assert_eq!(parse_timestamp(&a).unwrap(), earlier);
        assert_eq!(parse_timestamp(&b).unwrap(), later);
    }
}
