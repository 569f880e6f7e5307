//! Session bookkeeping and thread-safe result accumulation.

use chrono::{DateTime, Utc};
use common::id_type;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::detection::DetectionResult;

id_type!(SessionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    NotStarted,
    Running,
    Completed,
}

/// Persistence-shaped form of a [`DetectionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub session_id: SessionId,
    pub input_file_name: String,
    pub algorithm: Algorithm,
    pub iteration: usize,
    pub inlier_count: usize,
    pub total_count: usize,
    /// Already normalized: 0 when nothing was detected.
    pub ratio: f32,
    pub execution_ms: u64,
    pub parameters: String,
}

impl DetectionRecord {
    pub fn from_result(session_id: SessionId, result: &DetectionResult, iteration: usize) -> Self {
        Self {
            session_id,
            input_file_name: result.file_name.clone(),
            algorithm: result.algorithm,
            iteration,
            inlier_count: result.inlier_count,
            total_count: result.total_count,
            ratio: result.inlier_outlier_ratio(),
            execution_ms: result.execution_ms(),
            parameters: result.parameters.clone(),
        }
    }
}

/// One top-level run: `NotStarted -> Running -> Completed`.
///
/// `ended_at` stays `None` unless the run completes, which is how an
/// interrupted run stays observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzingSession {
    pub id: SessionId,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub results: Vec<DetectionRecord>,
    state: SessionState,
}

impl Default for FuzzingSession {
    fn default() -> Self {
        Self::new(SessionId::unique())
    }
}

impl FuzzingSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            started_at: None,
            ended_at: None,
            results: Vec::new(),
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start(&mut self) {
        assert_eq!(self.state, SessionState::NotStarted, "session already started");

        self.started_at = Some(Utc::now());
        self.state = SessionState::Running;
    }

    pub fn complete(&mut self) {
        assert_eq!(self.state, SessionState::Running, "session is not running");

        self.ended_at = Some(Utc::now());
        self.state = SessionState::Completed;
    }

    pub fn extend_results(&mut self, records: impl IntoIterator<Item = DetectionRecord>) {
        assert_eq!(self.state, SessionState::Running, "session is not running");

        self.results.extend(records);
    }
}

/// Accumulates records from concurrent detections until the controller
/// drains them for a batched commit.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    pending: Mutex<Vec<DetectionRecord>>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, session_id: SessionId, result: &DetectionResult, iteration: usize) {
        let record = DetectionRecord::from_result(session_id, result, iteration);
        self.pending.lock().push(record);
    }

    pub fn take_pending(&self) -> Vec<DetectionRecord> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
