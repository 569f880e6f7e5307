use std::fmt;

use super::{decimal_axis, int_axis, DetectorSettings, ParameterGrid};
use crate::algorithm::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiftParams {
    /// 0 keeps every feature.
    pub features: i32,
    pub octave_layers: i32,
    pub contrast_threshold: f64,
    pub edge_threshold: f64,
    pub sigma: f64,
}

impl fmt::Display for SiftParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "features: {}, octaveLayers: {}, contrastThreshold: {}, edgeThreshold: {}, sigma: {}",
            self.features, self.octave_layers, self.contrast_threshold, self.edge_threshold, self.sigma
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sift;

impl ParameterGrid for Sift {
    type Params = SiftParams;

    const ALGORITHM: Algorithm = Algorithm::Sift;

    /// Sigma runs 1.1..=1.9; the f64 sum for 2.0 comes out just above it.
    fn grid() -> Vec<SiftParams> {
        let contrast_thresholds = decimal_axis(1, 1, 10, 100.0);
        let edge_thresholds = decimal_axis(2, 2, 10, 1.0);
        let sigmas = decimal_axis(11, 1, 9, 10.0);
        let mut grid = Vec::new();

        for features in int_axis(0, 1250, 250) {
            for octave_layers in int_axis(1, 6, 1) {
                for &contrast_threshold in &contrast_thresholds {
                    for &edge_threshold in &edge_thresholds {
                        for &sigma in &sigmas {
                            grid.push(SiftParams {
                                features,
                                octave_layers,
                                contrast_threshold,
                                edge_threshold,
                                sigma,
                            });
                        }
                    }
                }
            }
        }

        grid
    }

    fn settings(params: &SiftParams) -> DetectorSettings {
        DetectorSettings::Sift(*params)
    }
}
