use std::fmt;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use super::{decimal_axis, int_axis, DetectorSettings, ParameterGrid};
use crate::algorithm::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum OrbScoreType {
    Fast,
    Harris,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbParams {
    pub features: i32,
    pub scale_factor: f32,
    pub levels: i32,
    pub edge_threshold: i32,
    pub score_type: OrbScoreType,
    pub patch_size: i32,
    pub fast_threshold: i32,
}

impl fmt::Display for OrbParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "numberOfFeatures: {}, scaleFactor: {}, levels: {}, edgeThreshold: {}, scoreType: {}, patchSize: {}, fastThreshold: {}",
            self.features,
            self.scale_factor,
            self.levels,
            self.edge_threshold,
            self.score_type,
            self.patch_size,
            self.fast_threshold
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Orb;

impl ParameterGrid for Orb {
    type Params = OrbParams;

    const ALGORITHM: Algorithm = Algorithm::Orb;

    /// The scale factor axis stops at 1.3: accumulating 0.1 in f32 overshoots 1.4.
    fn grid() -> Vec<OrbParams> {
        let scale_factors = decimal_axis(11, 1, 3, 10.0);
        let mut grid = Vec::new();

        for features in int_axis(250, 1500, 250) {
            for &scale_factor in &scale_factors {
                for levels in int_axis(1, 4, 1) {
                    for edge_threshold in int_axis(11, 46, 5) {
                        for score_type in OrbScoreType::iter() {
                            for patch_size in int_axis(11, 46, 5) {
                                for fast_threshold in int_axis(10, 30, 5) {
                                    grid.push(OrbParams {
                                        features,
                                        scale_factor: scale_factor as f32,
                                        levels,
                                        edge_threshold,
                                        score_type,
                                        patch_size,
                                        fast_threshold,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        grid
    }

    fn settings(params: &OrbParams) -> DetectorSettings {
        DetectorSettings::Orb(*params)
    }
}
