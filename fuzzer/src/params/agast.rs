use std::fmt;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use super::{int_axis, DetectorSettings, ParameterGrid};
use crate::algorithm::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum AgastType {
    #[strum(serialize = "AGAST_5_8")]
    Agast5_8,
    #[strum(serialize = "AGAST_7_12d")]
    Agast7_12d,
    #[strum(serialize = "AGAST_7_12s")]
    Agast7_12s,
    #[strum(serialize = "OAST_9_16")]
    Oast9_16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgastParams {
    pub agast_type: AgastType,
    pub threshold: i32,
    pub non_max_suppression: bool,
}

impl fmt::Display for AgastParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "agastType: {}, threshold: {}, useNonMaxSuppression: {}",
            self.agast_type, self.threshold, self.non_max_suppression
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Agast;

impl ParameterGrid for Agast {
    type Params = AgastParams;

    const ALGORITHM: Algorithm = Algorithm::Agast;

    /// threshold 2..=18 step 2, suppression on before off.
    fn grid() -> Vec<AgastParams> {
        let mut grid = Vec::new();

        for agast_type in AgastType::iter() {
            for threshold in int_axis(2, 18, 2) {
                for non_max_suppression in [true, false] {
                    grid.push(AgastParams {
                        agast_type,
                        threshold,
                        non_max_suppression,
                    });
                }
            }
        }

        grid
    }

    fn settings(params: &AgastParams) -> DetectorSettings {
        DetectorSettings::Agast(*params)
    }
}
