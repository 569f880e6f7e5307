use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{ResultStore, StoreError, StoreResult, StoredSession};
use crate::algorithm::Algorithm;
use crate::session::{DetectionRecord, FuzzingSession, SessionId};

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS FeatureDetectionFuzzingSession (
    Id        TEXT PRIMARY KEY NOT NULL,
    StartTime TEXT NOT NULL,
    EndTime   TEXT NULL
);

CREATE TABLE IF NOT EXISTS FeatureDetectionResult (
    Id              INTEGER PRIMARY KEY AUTOINCREMENT,
    InputFileName   TEXT NOT NULL,
    Algorithm       TEXT NOT NULL,
    Iteration       INTEGER NOT NULL,
    InlierCount     INTEGER NOT NULL,
    TotalCount      INTEGER NOT NULL,
    Ratio           REAL NOT NULL,
    ExecutionTimeMs INTEGER NOT NULL,
    Parameters      TEXT NOT NULL,
    SessionId       TEXT NOT NULL REFERENCES FeatureDetectionFuzzingSession (Id)
);

CREATE INDEX IF NOT EXISTS FeatureDetectionResult_SessionId
    ON FeatureDetectionResult (SessionId);
";

/// SQLite-backed [`ResultStore`].
#[derive(Debug)]
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!("Opening result database {}", path.display());

        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> StoreResult<Self> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self { connection })
    }

    pub fn load_session(&self, id: SessionId) -> StoreResult<Option<StoredSession>> {
        let times = self
            .connection
            .query_row(
                "SELECT StartTime, EndTime FROM FeatureDetectionFuzzingSession WHERE Id = ?1",
                params![id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((started_at, ended_at)) = times else {
            return Ok(None);
        };

        let mut statement = self.connection.prepare(
            "SELECT InputFileName, Algorithm, Iteration, InlierCount, TotalCount, Ratio, ExecutionTimeMs, Parameters
             FROM FeatureDetectionResult WHERE SessionId = ?1 ORDER BY Id",
        )?;
        let rows = statement.query_map(params![id.to_string()], |row| {
            Ok(RawRecord {
                input_file_name: row.get(0)?,
                algorithm: row.get(1)?,
                iteration: row.get(2)?,
                inlier_count: row.get(3)?,
                total_count: row.get(4)?,
                ratio: row.get(5)?,
                execution_ms: row.get(6)?,
                parameters: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record(id)?);
        }

        Ok(Some(StoredSession {
            started_at: Some(parse_timestamp(&started_at)?),
            ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
            records,
        }))
    }
}

impl ResultStore for SqliteStore {
    fn open_session(&mut self, session: &FuzzingSession) -> StoreResult<()> {
        let started_at = session.started_at.unwrap_or_else(Utc::now);

        let inserted = self.connection.execute(
            "INSERT OR IGNORE INTO FeatureDetectionFuzzingSession (Id, StartTime, EndTime) VALUES (?1, ?2, NULL)",
            params![session.id.to_string(), started_at.to_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(StoreError::DuplicateSession(session.id));
        }
        Ok(())
    }

    fn commit(&mut self, session_id: SessionId, records: &[DetectionRecord]) -> StoreResult<usize> {
        let transaction = self.connection.transaction()?;
        {
            let mut statement = transaction.prepare_cached(
                "INSERT INTO FeatureDetectionResult
                 (InputFileName, Algorithm, Iteration, InlierCount, TotalCount, Ratio, ExecutionTimeMs, Parameters, SessionId)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                statement.execute(params![
                    record.input_file_name,
                    record.algorithm.name(),
                    to_sql_int(record.iteration)?,
                    to_sql_int(record.inlier_count)?,
                    to_sql_int(record.total_count)?,
                    f64::from(record.ratio),
                    to_sql_int(record.execution_ms)?,
                    record.parameters,
                    session_id.to_string(),
                ])?;
            }
        }
        transaction.commit()?;

        debug!("Committed {} records for session {}", records.len(), session_id);
        Ok(records.len())
    }

    fn close_session(&mut self, session: &FuzzingSession) -> StoreResult<()> {
        let updated = self.connection.execute(
            "UPDATE FeatureDetectionFuzzingSession SET EndTime = ?2 WHERE Id = ?1",
            params![
                session.id.to_string(),
                session.ended_at.map(|ended_at| ended_at.to_rfc3339())
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownSession(session.id));
        }
        Ok(())
    }
}

struct RawRecord {
    input_file_name: String,
    algorithm: String,
    iteration: i64,
    inlier_count: i64,
    total_count: i64,
    ratio: f64,
    execution_ms: i64,
    parameters: String,
}

impl RawRecord {
    fn into_record(self, session_id: SessionId) -> StoreResult<DetectionRecord> {
        let algorithm: Algorithm = self
            .algorithm
            .parse()
            .map_err(|_| StoreError::Malformed(format!("algorithm '{}'", self.algorithm)))?;

        Ok(DetectionRecord {
            session_id,
            input_file_name: self.input_file_name,
            algorithm,
            iteration: from_sql_int(self.iteration)?,
            inlier_count: from_sql_int(self.inlier_count)?,
            total_count: from_sql_int(self.total_count)?,
            ratio: self.ratio as f32,
            execution_ms: from_sql_int(self.execution_ms)?,
            parameters: self.parameters,
        })
    }
}

fn to_sql_int<T: TryInto<i64> + Copy + std::fmt::Display>(value: T) -> StoreResult<i64> {
    value
        .try_into()
        .map_err(|_| StoreError::Malformed(format!("{value} does not fit in an INTEGER column")))
}

fn from_sql_int<T: TryFrom<i64>>(value: i64) -> StoreResult<T> {
    T::try_from(value).map_err(|_| StoreError::Malformed(format!("negative or oversized count {value}")))
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StoreError::Malformed(format!("timestamp '{value}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::super::tests::record;
    use super::*;
    use common::test_utils::fresh_test_output_dir;

    fn running_session() -> FuzzingSession {
        let mut session = FuzzingSession::default();
        session.start();
        session
    }

    #[test]
    fn commit_and_reload_records() {
        let mut store = SqliteStore::in_memory().unwrap();
        let session = running_session();

        store.open_session(&session).unwrap();
        let records = vec![record(session.id, 0), record(session.id, 1), record(session.id, 2)];
        assert_eq!(store.commit(session.id, &records).unwrap(), 3);

        let stored = store.load_session(session.id).unwrap().unwrap();
        assert_eq!(stored.records, records);
        assert_eq!(
            stored.started_at.unwrap().timestamp_millis(),
            session.started_at.unwrap().timestamp_millis()
        );
    }

    #[test]
    fn unclosed_session_keeps_null_end_time() {
        let mut store = SqliteStore::in_memory().unwrap();
        let session = running_session();

        store.open_session(&session).unwrap();
        store.commit(session.id, &[record(session.id, 0)]).unwrap();

        let stored = store.load_session(session.id).unwrap().unwrap();
        assert!(stored.started_at.is_some());
        assert!(stored.ended_at.is_none());
    }

    #[test]
    fn closed_session_round_trips_end_time() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut session = running_session();

        store.open_session(&session).unwrap();
        session.complete();
        store.close_session(&session).unwrap();

        let stored = store.load_session(session.id).unwrap().unwrap();
        assert!(stored.records.is_empty());
        assert_eq!(
            stored.ended_at.unwrap().timestamp_millis(),
            session.ended_at.unwrap().timestamp_millis()
        );
    }

    #[test]
    fn records_for_unknown_session_violate_foreign_key() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = SessionId::unique();

        assert!(matches!(
            store.commit(id, &[record(id, 0)]),
            Err(StoreError::Database(_))
        ));
        assert!(store.load_session(id).unwrap().is_none());
    }

    #[test]
    fn database_file_persists_between_connections() {
        let path = fresh_test_output_dir("sqlite_store").join("results.sqlite");
        let session = running_session();

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.open_session(&session).unwrap();
            store.commit(session.id, &[record(session.id, 5)]).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let stored = store.load_session(session.id).unwrap().unwrap();
        assert_eq!(stored.records.len(), 1);
        assert_eq!(stored.records[0].iteration, 5);
    }
}
