use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use thiserror::Error;

use crate::algorithm::Algorithm;
use crate::params::{generate, ImageContext, ParameterGrid, ParameterSet};
use crate::region::RegionOfInterest;

pub mod backend;
#[cfg(feature = "opencv")]
pub mod opencv;

use backend::DetectionBackend;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KeyPoint {
    pub position: Vec2,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
    pub octave: i32,
}

impl KeyPoint {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("{algorithm} detector could not be constructed with [{parameters}]: {message}")]
    Construction {
        algorithm: Algorithm,
        parameters: String,
        message: String,
    },
    #[error("{algorithm} detection failed with [{parameters}]: {message}")]
    Execution {
        algorithm: Algorithm,
        parameters: String,
        message: String,
    },
}

impl DetectionError {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            DetectionError::Construction { algorithm, .. }
            | DetectionError::Execution { algorithm, .. } => *algorithm,
        }
    }

    pub fn parameters(&self) -> &str {
        match self {
            DetectionError::Construction { parameters, .. }
            | DetectionError::Execution { parameters, .. } => parameters,
        }
    }
}

/// Outcome of one detector invocation.
///
/// `inlier_count <= total_count` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub file_name: String,
    pub keypoints: Vec<KeyPoint>,
    pub total_count: usize,
    pub inlier_count: usize,
    pub execution_time: Duration,
    pub algorithm: Algorithm,
    pub parameters: String,
}

impl DetectionResult {
    pub fn new(
        file_name: impl Into<String>,
        algorithm: Algorithm,
        parameters: impl Into<String>,
        keypoints: Vec<KeyPoint>,
        region: &RegionOfInterest,
        execution_time: Duration,
    ) -> Self {
        let inlier_count = region.count_inliers(&keypoints);
        Self {
            file_name: file_name.into(),
            total_count: keypoints.len(),
            inlier_count,
            keypoints,
            execution_time,
            algorithm,
            parameters: parameters.into(),
        }
    }

    /// Fraction of keypoints inside the region; 0 when nothing was detected.
    pub fn inlier_outlier_ratio(&self) -> f32 {
        if self.total_count == 0 {
            0.0
        } else {
            self.inlier_count as f32 / self.total_count as f32
        }
    }

    pub fn execution_ms(&self) -> u64 {
        self.execution_time.as_millis() as u64
    }
}

/// `{generate parameters, perform one detection}` for one detector family.
///
/// The execution engine is written against this trait only.
pub trait DetectionCapability: Sync {
    type Image: Send + Sync;
    type Params: Send + Sync;

    fn algorithm(&self) -> Algorithm;

    fn generate_parameters(&self, context: &Arc<ImageContext<Self::Image>>) -> Vec<Self::Params>;

    fn perform_detection(&self, params: &Self::Params) -> Result<DetectionResult, DetectionError>;
}

/// Adapts a [`DetectionBackend`] to the capability contract for grid `G`.
pub struct FamilyAdapter<'a, G, B> {
    backend: &'a B,
    _grid: PhantomData<fn() -> G>,
}

impl<'a, G: ParameterGrid, B: DetectionBackend> FamilyAdapter<'a, G, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            _grid: PhantomData,
        }
    }
}

impl<G: ParameterGrid, B: DetectionBackend> DetectionCapability for FamilyAdapter<'_, G, B> {
    type Image = B::Image;
    type Params = ParameterSet<G::Params, B::Image>;

    fn algorithm(&self) -> Algorithm {
        G::ALGORITHM
    }

    fn generate_parameters(&self, context: &Arc<ImageContext<B::Image>>) -> Vec<Self::Params> {
        generate::<G, B::Image>(context)
    }

    fn perform_detection(&self, params: &Self::Params) -> Result<DetectionResult, DetectionError> {
        let context = params.context();
        let settings = G::settings(params.params());

        let start = Instant::now();
        let keypoints = self
            .backend
            .detect(&context.image, &settings)
            .map_err(|err| err.into_detection_error(G::ALGORITHM, params.params().to_string()))?;
        let execution_time = start.elapsed();

        Ok(DetectionResult::new(
            context.file_name.clone(),
            G::ALGORITHM,
            params.params().to_string(),
            keypoints,
            &context.region,
            execution_time,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::backend::BackendError;
    use super::*;
    use crate::params::{Agast, DetectorSettings};
    use image::RgbImage;
    use rand::Rng;

    struct FixedBackend {
        keypoints: Vec<KeyPoint>,
        reject_threshold: Option<i32>,
    }

    impl DetectionBackend for FixedBackend {
        type Image = ();

        fn prepare(&self, _image: &RgbImage) -> Result<(), BackendError> {
            Ok(())
        }

        fn detect(&self, _image: &(), settings: &DetectorSettings) -> Result<Vec<KeyPoint>, BackendError> {
            match settings {
                DetectorSettings::Agast(params) if Some(params.threshold) == self.reject_threshold => {
                    Err(BackendError::Construction("threshold out of range".to_string()))
                }
                _ => Ok(self.keypoints.clone()),
            }
        }
    }

    #[test]
    fn ratio_is_zero_without_keypoints() {
        let result = DetectionResult::new(
            "a.jpg",
            Algorithm::Orb,
            "",
            vec![],
            &RegionOfInterest::new(0, 0, 10, 10),
            Duration::ZERO,
        );
        assert_eq!(result.total_count, 0);
        assert_eq!(result.inlier_outlier_ratio(), 0.0);
        assert!(!result.inlier_outlier_ratio().is_nan());
    }

    #[test]
    fn ratio_stays_in_unit_interval() {
        let mut rng = rand::rng();
        let region = RegionOfInterest::new(20, 20, 40, 40);
        for _ in 0..200 {
            let count = rng.random_range(0..50);
            let keypoints: Vec<KeyPoint> = (0..count)
                .map(|_| KeyPoint::at(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)))
                .collect();
            let result =
                DetectionResult::new("a.jpg", Algorithm::Sift, "", keypoints, &region, Duration::ZERO);

            let ratio = result.inlier_outlier_ratio();
            assert!(result.inlier_count <= result.total_count);
            assert!((0.0..=1.0).contains(&ratio));
            if result.total_count > 0 {
                assert_eq!(ratio, result.inlier_count as f32 / result.total_count as f32);
            }
        }
    }

    #[test]
    fn adapter_classifies_keypoints_against_region() {
        let backend = FixedBackend {
            keypoints: vec![KeyPoint::at(15.0, 15.0), KeyPoint::at(100.0, 100.0)],
            reject_threshold: None,
        };
        let adapter = FamilyAdapter::<Agast, _>::new(&backend);
        let context = ImageContext::new("frame.png", RegionOfInterest::new(10, 10, 50, 50), ());

        let params = adapter.generate_parameters(&context);
        assert_eq!(params.len(), 72);

        let result = adapter.perform_detection(&params[0]).unwrap();
        assert_eq!(result.algorithm, Algorithm::Agast);
        assert_eq!(result.file_name, "frame.png");
        assert_eq!(result.total_count, 2);
        assert_eq!(result.inlier_count, 1);
        assert_eq!(result.inlier_outlier_ratio(), 0.5);
        assert_eq!(
            result.parameters,
            "agastType: AGAST_5_8, threshold: 2, useNonMaxSuppression: true"
        );
    }

    #[test]
    fn adapter_maps_backend_rejection_to_construction_error() {
        let backend = FixedBackend {
            keypoints: vec![],
            reject_threshold: Some(2),
        };
        let adapter = FamilyAdapter::<Agast, _>::new(&backend);
        let context = ImageContext::new("frame.png", RegionOfInterest::default(), ());
        let params = adapter.generate_parameters(&context);

        let err = adapter.perform_detection(&params[0]).unwrap_err();
        assert!(matches!(err, DetectionError::Construction { .. }));
        assert_eq!(err.algorithm(), Algorithm::Agast);
        assert!(err.parameters().contains("threshold: 2"));

        assert!(adapter.perform_detection(&params[2]).is_ok());
    }
}
