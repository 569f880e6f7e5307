//! Durable storage of sessions and their detection records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::session::{DetectionRecord, FuzzingSession, SessionId};

mod sqlite;

pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("session {0} is not open")]
    UnknownSession(SessionId),
    #[error("session {0} already exists")]
    DuplicateSession(SessionId),
    #[error("stored value is malformed: {0}")]
    Malformed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Relational persistence of fuzzing sessions.
///
/// Records are committed in batches, once per image and family.
pub trait ResultStore: Send {
    fn open_session(&mut self, session: &FuzzingSession) -> StoreResult<()>;

    /// Persists `records` atomically and returns how many were written.
    fn commit(&mut self, session_id: SessionId, records: &[DetectionRecord]) -> StoreResult<usize>;

    fn close_session(&mut self, session: &FuzzingSession) -> StoreResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub records: Vec<DetectionRecord>,
}

/// Keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: HashMap<SessionId, StoredSession>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, id: SessionId) -> Option<&StoredSession> {
        self.sessions.get(&id)
    }

    pub fn record_count(&self) -> usize {
        self.sessions.values().map(|s| s.records.len()).sum()
    }
}

impl ResultStore for MemoryStore {
    fn open_session(&mut self, session: &FuzzingSession) -> StoreResult<()> {
        if self.sessions.contains_key(&session.id) {
            return Err(StoreError::DuplicateSession(session.id));
        }

        self.sessions.insert(
            session.id,
            StoredSession {
                started_at: session.started_at,
                ended_at: None,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    fn commit(&mut self, session_id: SessionId, records: &[DetectionRecord]) -> StoreResult<usize> {
        let stored = self
            .sessions
            .get_mut(&session_id)
            .ok_or(StoreError::UnknownSession(session_id))?;

        stored.records.extend_from_slice(records);
        Ok(records.len())
    }

    fn close_session(&mut self, session: &FuzzingSession) -> StoreResult<()> {
        let stored = self
            .sessions
            .get_mut(&session.id)
            .ok_or(StoreError::UnknownSession(session.id))?;

        stored.ended_at = session.ended_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;

    pub(super) fn record(session_id: SessionId, iteration: usize) -> DetectionRecord {
        DetectionRecord {
            session_id,
            input_file_name: "scene.jpg".to_string(),
            algorithm: Algorithm::Agast,
            iteration,
            inlier_count: 3,
            total_count: 4,
            ratio: 0.75,
            execution_ms: 7,
            parameters: "agastType: OAST_9_16, threshold: 4, useNonMaxSuppression: false".to_string(),
        }
    }

    #[test]
    fn memory_store_tracks_session_lifecycle() {
        let mut store = MemoryStore::new();
        let mut session = FuzzingSession::default();
        session.start();

        store.open_session(&session).unwrap();
        assert_eq!(store.commit(session.id, &[record(session.id, 0), record(session.id, 1)]).unwrap(), 2);
        assert!(store.session(session.id).unwrap().ended_at.is_none());

        session.complete();
        store.close_session(&session).unwrap();

        let stored = store.session(session.id).unwrap();
        assert_eq!(stored.records.len(), 2);
        assert_eq!(stored.ended_at, session.ended_at);
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn memory_store_rejects_unknown_session() {
        let mut store = MemoryStore::new();
        let id = SessionId::unique();

        assert!(matches!(
            store.commit(id, &[record(id, 0)]),
            Err(StoreError::UnknownSession(unknown)) if unknown == id
        ));
    }

    #[test]
    fn memory_store_rejects_duplicate_session() {
        let mut store = MemoryStore::new();
        let session = FuzzingSession::default();

        store.open_session(&session).unwrap();
        assert!(matches!(
            store.open_session(&session),
            Err(StoreError::DuplicateSession(_))
        ));
    }
}
