use image::RgbImage;
use thiserror::Error;

use super::{DetectionError, KeyPoint};
use crate::algorithm::Algorithm;
use crate::params::DetectorSettings;

/// Failure reported by a native detector library.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("detector rejected its configuration: {0}")]
    Construction(String),
    #[error("detection failed: {0}")]
    Execution(String),
    #[error("backend initialization failed: {0}")]
    Initialization(String),
    #[error("image preparation failed: {0}")]
    Preparation(String),
}

impl BackendError {
    pub(crate) fn into_detection_error(self, algorithm: Algorithm, parameters: String) -> DetectionError {
        match self {
            BackendError::Construction(message) => DetectionError::Construction {
                algorithm,
                parameters,
                message,
            },
            other => DetectionError::Execution {
                algorithm,
                parameters,
                message: other.to_string(),
            },
        }
    }
}

/// The external image-processing capability that actually finds keypoints.
///
/// Implementations allocate whatever native detector object `settings`
/// describes, run it on `image` and release it before returning, on both the
/// success and the failure path. `detect` is called concurrently from worker
/// threads and must not mutate `image`.
pub trait DetectionBackend: Send + Sync {
    /// Backend-native form of a decoded input image.
    type Image: Send + Sync;

    /// Process-wide setup, called once before the first image.
    fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Undoes [`DetectionBackend::initialize`].
    fn shutdown(&self) {}

    fn prepare(&self, image: &RgbImage) -> Result<Self::Image, BackendError>;

    fn detect(
        &self,
        image: &Self::Image,
        settings: &DetectorSettings,
    ) -> Result<Vec<KeyPoint>, BackendError>;
}

/// Keeps a backend initialized for the guard's lifetime.
pub struct BackendGuard<'a, B: DetectionBackend> {
    backend: &'a B,
}

impl<'a, B: DetectionBackend> BackendGuard<'a, B> {
    pub fn new(backend: &'a B) -> Result<Self, BackendError> {
        backend.initialize()?;
        Ok(Self { backend })
    }
}

impl<B: DetectionBackend> Drop for BackendGuard<'_, B> {
    fn drop(&mut self) {
        self.backend.shutdown();
    }
}
