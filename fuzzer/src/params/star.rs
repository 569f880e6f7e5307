use std::fmt;

use super::{int_axis, DetectorSettings, ParameterGrid};
use crate::algorithm::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarParams {
    pub max_size: i32,
    pub response_threshold: i32,
    pub line_threshold_projected: i32,
    pub line_threshold_binarized: i32,
    pub suppress_non_max_size: i32,
}

impl fmt::Display for StarParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "maxSize: {}, responseThreshold: {}, lineThresholdProjected: {}, lineThresholdBinarized: {}, suppressNonMaxSize: {}",
            self.max_size,
            self.response_threshold,
            self.line_threshold_projected,
            self.line_threshold_binarized,
            self.suppress_non_max_size
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Star;

impl ParameterGrid for Star {
    type Params = StarParams;

    const ALGORITHM: Algorithm = Algorithm::Star;

    fn grid() -> Vec<StarParams> {
        let mut grid = Vec::new();

        for max_size in int_axis(25, 65, 5) {
            for response_threshold in int_axis(10, 50, 10) {
                for line_threshold_projected in int_axis(4, 16, 2) {
                    for line_threshold_binarized in int_axis(4, 14, 2) {
                        for suppress_non_max_size in int_axis(1, 15, 2) {
                            grid.push(StarParams {
                                max_size,
                                response_threshold,
                                line_threshold_projected,
                                line_threshold_binarized,
                                suppress_non_max_size,
                            });
                        }
                    }
                }
            }
        }

        grid
    }

    fn settings(params: &StarParams) -> DetectorSettings {
        DetectorSettings::Star(*params)
    }
}
