//! OpenCV implementation of [`DetectionBackend`].
//!
//! AKAZE, AGAST, ORB and SIFT come from `features2d`, STAR from the contrib
//! `xfeatures2d` module. A detector object is created per call and dropped
//! when the call returns.

use image::{GrayImage, RgbImage};
use opencv::core::{self, KeyPoint as CvKeyPoint, Mat, Scalar, Vector, CV_8UC1};
use opencv::features2d::{
    AKAZE_DescriptorType, AgastFeatureDetector, AgastFeatureDetector_DetectorType, Feature2DTrait,
    KAZE_DiffusivityType, ORB_ScoreType, AKAZE, ORB, SIFT,
};
use opencv::prelude::*;
use opencv::xfeatures2d::StarDetector;
use tracing::{debug, warn};

use super::backend::{BackendError, DetectionBackend};
use super::KeyPoint;
use crate::params::{
    AgastParams, AgastType, AkazeDescriptorType, AkazeParams, DetectorSettings, Diffusivity,
    OrbParams, OrbScoreType, SiftParams, StarParams,
};

#[derive(Debug, Clone)]
pub struct OpenCvBackend {
    pub use_opencl: bool,
}

impl Default for OpenCvBackend {
    fn default() -> Self {
        Self { use_opencl: true }
    }
}

impl DetectionBackend for OpenCvBackend {
    type Image = GrayImage;

    fn initialize(&self) -> Result<(), BackendError> {
        core::set_use_opencl(self.use_opencl)
            .map_err(|err| BackendError::Initialization(err.to_string()))?;
        let active = core::use_opencl().unwrap_or(false);
        debug!(requested = self.use_opencl, active, "OpenCL acceleration");
        Ok(())
    }

    fn shutdown(&self) {
        if let Err(err) = core::set_use_opencl(false) {
            warn!("Failed to disable OpenCL: {err}");
        }
    }

    fn prepare(&self, image: &RgbImage) -> Result<GrayImage, BackendError> {
        Ok(image::imageops::grayscale(image))
    }

    fn detect(
        &self,
        image: &GrayImage,
        settings: &DetectorSettings,
    ) -> Result<Vec<KeyPoint>, BackendError> {
        let mat = to_mat(image).map_err(|err| BackendError::Execution(err.to_string()))?;

        let keypoints = match settings {
            DetectorSettings::Akaze(params) => run(create_akaze(params)?, &mat)?,
            DetectorSettings::Agast(params) => run(create_agast(params)?, &mat)?,
            DetectorSettings::Orb(params) => run(create_orb(params)?, &mat)?,
            DetectorSettings::Star(params) => run(create_star(params)?, &mat)?,
            DetectorSettings::Sift(params) => run(create_sift(params)?, &mat)?,
        };

        Ok(keypoints.iter().map(|kp| convert(&kp)).collect())
    }
}

fn to_mat(image: &GrayImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}

fn run<D: Feature2DTrait>(mut detector: D, mat: &Mat) -> Result<Vector<CvKeyPoint>, BackendError> {
    let mut keypoints = Vector::<CvKeyPoint>::new();
    detector
        .detect(mat, &mut keypoints, &core::no_array())
        .map_err(|err| BackendError::Execution(err.to_string()))?;
    Ok(keypoints)
}

fn convert(keypoint: &CvKeyPoint) -> KeyPoint {
    let pt = keypoint.pt();
    KeyPoint {
        position: glam::Vec2::new(pt.x, pt.y),
        size: keypoint.size(),
        angle: keypoint.angle(),
        response: keypoint.response(),
        octave: keypoint.octave(),
    }
}

fn construction(err: opencv::Error) -> BackendError {
    BackendError::Construction(err.to_string())
}

fn create_akaze(params: &AkazeParams) -> Result<core::Ptr<AKAZE>, BackendError> {
    let descriptor_type = match params.descriptor_type {
        AkazeDescriptorType::KazeUpright => AKAZE_DescriptorType::DESCRIPTOR_KAZE_UPRIGHT,
        AkazeDescriptorType::MldbUpright => AKAZE_DescriptorType::DESCRIPTOR_MLDB_UPRIGHT,
    };
    let diffusivity = match params.diffusivity {
        Diffusivity::PmG1 => KAZE_DiffusivityType::DIFF_PM_G1,
        Diffusivity::PmG2 => KAZE_DiffusivityType::DIFF_PM_G2,
        Diffusivity::Weickert => KAZE_DiffusivityType::DIFF_WEICKERT,
        Diffusivity::Charbonnier => KAZE_DiffusivityType::DIFF_CHARBONNIER,
    };

    let mut detector = AKAZE::create_def().map_err(construction)?;
    detector.set_descriptor_type(descriptor_type).map_err(construction)?;
    detector.set_diffusivity(diffusivity).map_err(construction)?;
    detector
        .set_threshold(params.threshold as f64)
        .map_err(construction)?;
    detector.set_n_octaves(params.octaves).map_err(construction)?;
    detector
        .set_n_octave_layers(params.octave_layers)
        .map_err(construction)?;
    Ok(detector)
}

fn create_agast(params: &AgastParams) -> Result<core::Ptr<AgastFeatureDetector>, BackendError> {
    let detector_type = match params.agast_type {
        AgastType::Agast5_8 => AgastFeatureDetector_DetectorType::AGAST_5_8,
        AgastType::Agast7_12d => AgastFeatureDetector_DetectorType::AGAST_7_12d,
        AgastType::Agast7_12s => AgastFeatureDetector_DetectorType::AGAST_7_12s,
        AgastType::Oast9_16 => AgastFeatureDetector_DetectorType::OAST_9_16,
    };
    AgastFeatureDetector::create(params.threshold, params.non_max_suppression, detector_type)
        .map_err(construction)
}

fn create_orb(params: &OrbParams) -> Result<core::Ptr<ORB>, BackendError> {
    let score_type = match params.score_type {
        OrbScoreType::Fast => ORB_ScoreType::FAST_SCORE,
        OrbScoreType::Harris => ORB_ScoreType::HARRIS_SCORE,
    };
    ORB::create(
        params.features,
        params.scale_factor,
        params.levels,
        params.edge_threshold,
        0,
        2,
        score_type,
        params.patch_size,
        params.fast_threshold,
    )
    .map_err(construction)
}

fn create_star(params: &StarParams) -> Result<core::Ptr<StarDetector>, BackendError> {
    StarDetector::create(
        params.max_size,
        params.response_threshold,
        params.line_threshold_projected,
        params.line_threshold_binarized,
        params.suppress_non_max_size,
    )
    .map_err(construction)
}

fn create_sift(params: &SiftParams) -> Result<core::Ptr<SIFT>, BackendError> {
    SIFT::create(
        params.features,
        params.octave_layers,
        params.contrast_threshold,
        params.edge_threshold,
        params.sigma,
        false,
    )
    .map_err(construction)
}
