use std::fmt;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use super::{decimal_axis, int_axis, DetectorSettings, ParameterGrid};
use crate::algorithm::Algorithm;

/// Only the rotation-variant ("upright") descriptors are swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum AkazeDescriptorType {
    KazeUpright,
    MldbUpright,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Diffusivity {
    PmG1,
    PmG2,
    Weickert,
    Charbonnier,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AkazeParams {
    pub descriptor_type: AkazeDescriptorType,
    pub diffusivity: Diffusivity,
    pub threshold: f32,
    pub octaves: i32,
    pub octave_layers: i32,
}

impl fmt::Display for AkazeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "descriptorType: {}, diffusivityType: {}, threshold: {}, octaves: {}, octaveLayers: {}",
            self.descriptor_type, self.diffusivity, self.threshold, self.octaves, self.octave_layers
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Akaze;

impl ParameterGrid for Akaze {
    type Params = AkazeParams;

    const ALGORITHM: Algorithm = Algorithm::Akaze;

    /// threshold 0.001..=0.051 step 0.005, octaves and octave layers 1..=6.
    ///
    /// The threshold bound is exclusive at 0.051 but the f32 sum lands just
    /// below it, so 0.051 itself is swept.
    fn grid() -> Vec<AkazeParams> {
        let thresholds = decimal_axis(1, 5, 11, 1000.0);
        let mut grid = Vec::new();

        for descriptor_type in AkazeDescriptorType::iter() {
            for diffusivity in Diffusivity::iter() {
                for &threshold in &thresholds {
                    for octaves in int_axis(1, 6, 1) {
                        for octave_layers in int_axis(1, 6, 1) {
                            grid.push(AkazeParams {
                                descriptor_type,
                                diffusivity,
                                threshold: threshold as f32,
                                octaves,
                                octave_layers,
                            });
                        }
                    }
                }
            }
        }

        grid
    }

    fn settings(params: &AkazeParams) -> DetectorSettings {
        DetectorSettings::Akaze(*params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_size() {
        assert_eq!(Akaze::grid().len(), 2 * 4 * 11 * 6 * 6);
    }

    #[test]
    fn outer_axis_varies_slowest() {
        let grid = Akaze::grid();
        let first = grid[0];
        let last = *grid.last().unwrap();

        assert_eq!(first.descriptor_type, AkazeDescriptorType::KazeUpright);
        assert_eq!(first.diffusivity, Diffusivity::PmG1);
        assert_eq!((first.octaves, first.octave_layers), (1, 1));
        assert_eq!(grid[1].octave_layers, 2);
        assert_eq!(grid[6].octaves, 2);

        assert_eq!(last.descriptor_type, AkazeDescriptorType::MldbUpright);
        assert_eq!(last.diffusivity, Diffusivity::Charbonnier);
        assert_eq!(last.threshold.to_string(), "0.051");
        assert_eq!((last.octaves, last.octave_layers), (6, 6));
    }

    #[test]
    fn description_uses_stable_field_names() {
        let params = Akaze::grid()[36];
        assert_eq!(
            params.to_string(),
            "descriptorType: KazeUpright, diffusivityType: PmG1, threshold: 0.006, octaves: 1, octaveLayers: 1"
        );
    }
}
