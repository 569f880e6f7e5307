pub mod algorithm;
pub mod annotate;
pub mod config;
pub mod controller;
pub mod detection;
pub mod engine;
pub mod error;
pub mod input;
pub mod params;
pub mod region;
pub mod report;
pub mod session;
pub mod store;


pub mod prelude {
    pub use crate::algorithm::{Algorithm, AlgorithmSet};
    pub use crate::config::FuzzConfig;
    pub use crate::controller::{FuzzController, SessionSummary};
    pub use crate::detection::backend::{BackendError, DetectionBackend};
    pub use crate::detection::{DetectionCapability, DetectionError, DetectionResult, KeyPoint};
    pub use crate::engine::{ExecutionOptions, FailurePolicy};
    pub use crate::error::{FuzzError, FuzzResult};
    pub use crate::region::RegionOfInterest;
    pub use crate::session::{FuzzingSession, SessionId, SessionState};
    pub use crate::store::{MemoryStore, ResultStore, SqliteStore};
}
