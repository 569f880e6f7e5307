use thiserror::Error;

use crate::detection::backend::BackendError;
use crate::input::InputError;
use crate::report::ReportError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum FuzzError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("input not found: {0}")]
    InputNotFound(String),
    #[error(transparent)]
    Input(InputError),
    #[error("detection backend unavailable: {0}")]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("fuzzing session was cancelled")]
    Cancelled,
}

impl From<InputError> for FuzzError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::NotFound(dir) => FuzzError::InputNotFound(dir.display().to_string()),
            other => FuzzError::Input(other),
        }
    }
}

pub type FuzzResult<T> = Result<T, FuzzError>;
