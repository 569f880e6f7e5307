//! Parameter grids swept for each detector family.
//!
//! Every grid is the cartesian product of fixed axes, enumerated in nested
//! order with the first axis varying slowest. The order is part of the output
//! contract: iteration numbers in reports index into it.

use std::fmt;
use std::sync::Arc;

use crate::algorithm::Algorithm;
use crate::region::RegionOfInterest;

mod agast;
mod akaze;
mod orb;
mod sift;
mod star;

pub use agast::{Agast, AgastParams, AgastType};
pub use akaze::{Akaze, AkazeDescriptorType, AkazeParams, Diffusivity};
pub use orb::{Orb, OrbParams, OrbScoreType};
pub use sift::{Sift, SiftParams};
pub use star::{Star, StarParams};

/// Detector configuration handed to a detection backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorSettings {
    Akaze(AkazeParams),
    Agast(AgastParams),
    Orb(OrbParams),
    Star(StarParams),
    Sift(SiftParams),
}

impl DetectorSettings {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            DetectorSettings::Akaze(_) => Algorithm::Akaze,
            DetectorSettings::Agast(_) => Algorithm::Agast,
            DetectorSettings::Orb(_) => Algorithm::Orb,
            DetectorSettings::Star(_) => Algorithm::Star,
            DetectorSettings::Sift(_) => Algorithm::Sift,
        }
    }
}

impl fmt::Display for DetectorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorSettings::Akaze(params) => params.fmt(f),
            DetectorSettings::Agast(params) => params.fmt(f),
            DetectorSettings::Orb(params) => params.fmt(f),
            DetectorSettings::Star(params) => params.fmt(f),
            DetectorSettings::Sift(params) => params.fmt(f),
        }
    }
}

/// A detector family's parameter space.
///
/// `Display` on [`ParameterGrid::Params`] is the order-stable description
/// written verbatim into reports.
pub trait ParameterGrid: Send + Sync + 'static {
    type Params: Copy + Send + Sync + fmt::Debug + fmt::Display;

    const ALGORITHM: Algorithm;

    /// All combinations, outer axis varying slowest.
    fn grid() -> Vec<Self::Params>;

    fn settings(params: &Self::Params) -> DetectorSettings;
}

/// One input image as seen by every parameter set generated for it.
#[derive(Debug)]
pub struct ImageContext<I> {
    pub file_name: String,
    pub region: RegionOfInterest,
    pub image: I,
}

impl<I> ImageContext<I> {
    pub fn new(file_name: impl Into<String>, region: RegionOfInterest, image: I) -> Arc<Self> {
        Arc::new(Self {
            file_name: file_name.into(),
            region,
            image,
        })
    }
}

/// Immutable `(image, region, detector parameters)` tuple.
///
/// The image context is shared read-only between all sets of one image.
#[derive(Debug)]
pub struct ParameterSet<P, I> {
    context: Arc<ImageContext<I>>,
    params: P,
}

impl<P, I> ParameterSet<P, I> {
    pub fn new(context: Arc<ImageContext<I>>, params: P) -> Self {
        Self { context, params }
    }

    pub fn context(&self) -> &ImageContext<I> {
        &self.context
    }

    pub fn params(&self) -> &P {
        &self.params
    }
}

impl<P: Clone, I> Clone for ParameterSet<P, I> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            params: self.params.clone(),
        }
    }
}

/// Pairs every combination of `G` with the image context.
pub fn generate<G: ParameterGrid, I>(
    context: &Arc<ImageContext<I>>,
) -> Vec<ParameterSet<G::Params, I>> {
    G::grid()
        .into_iter()
        .map(|params| ParameterSet::new(Arc::clone(context), params))
        .collect()
}

/// Inclusive integer axis `start..=end` advancing by `step`.
pub(crate) fn int_axis(start: i32, end: i32, step: usize) -> impl Iterator<Item = i32> + Clone {
    (start..=end).step_by(step)
}

/// `count` decimal values `(start + k * step) / scale`.
///
/// Values are built from integer numerators so each one is the nearest float
/// to its decimal literal instead of an accumulated sum.
pub(crate) fn decimal_axis(start: i32, step: i32, count: i32, scale: f64) -> Vec<f64> {
    (0..count)
        .map(|k| (start + k * step) as f64 / scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_axis_is_inclusive() {
        assert_eq!(int_axis(11, 46, 5).collect::<Vec<_>>(), vec![11, 16, 21, 26, 31, 36, 41, 46]);
        assert_eq!(int_axis(2, 18, 2).count(), 9);
    }

    #[test]
    fn decimal_axis_prints_exact_values() {
        let values = decimal_axis(11, 1, 10, 10.0);
        assert_eq!(values.len(), 10);
        assert_eq!(values[0].to_string(), "1.1");
        assert_eq!(values[3].to_string(), "1.4");
        assert_eq!(values[9].to_string(), "2");
    }

    /// Values a float loop `v = start; v (<= | <) end; v += step` visits.
    fn accumulated_f32(start: f32, end: f32, step: f32, inclusive: bool) -> Vec<f32> {
        let mut values = Vec::new();
        let mut value = start;
        while if inclusive { value <= end } else { value < end } {
            values.push(value);
            value += step;
        }
        values
    }

    fn accumulated_f64(start: f64, end: f64, step: f64) -> Vec<f64> {
        let mut values = Vec::new();
        let mut value = start;
        while value <= end {
            values.push(value);
            value += step;
        }
        values
    }

    fn distinct<T: Copy + PartialEq>(values: impl Iterator<Item = T>) -> Vec<T> {
        let mut seen = Vec::new();
        for value in values {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }

    fn assert_close_f32(axis: &[f32], accumulated: &[f32]) {
        assert_eq!(axis.len(), accumulated.len());
        for (value, expected) in axis.iter().zip(accumulated) {
            assert!((value - expected).abs() < 1e-5, "{value} != {expected}");
        }
    }

    #[test]
    fn float_axes_match_accumulated_loops() {
        let scale_factors = distinct(Orb::grid().iter().map(|params| params.scale_factor));
        assert_close_f32(&scale_factors, &accumulated_f32(1.1, 1.4, 0.1, true));
        assert_eq!(Orb::grid().len(), 46080);

        let thresholds = distinct(Akaze::grid().iter().map(|params| params.threshold));
        assert_close_f32(&thresholds, &accumulated_f32(0.001, 0.051, 0.005, false));
        assert_eq!(Akaze::grid().len(), 3168);

        let sigmas = distinct(Sift::grid().iter().map(|params| params.sigma));
        let expected = accumulated_f64(1.1, 2.0, 0.1);
        assert_eq!(sigmas.len(), expected.len());
        for (value, expected) in sigmas.iter().zip(&expected) {
            assert!((value - expected).abs() < 1e-9, "{value} != {expected}");
        }
        let contrast = distinct(Sift::grid().iter().map(|params| params.contrast_threshold));
        assert_eq!(contrast.len(), accumulated_f64(0.01, 0.1, 0.01).len());
        assert_eq!(Sift::grid().len(), 32400);
    }

    #[test]
    fn generated_sets_share_one_context() {
        let context = ImageContext::new("a.jpg", RegionOfInterest::new(0, 0, 5, 5), 7u8);
        let sets = generate::<Agast, u8>(&context);

        assert_eq!(sets.len(), 72);
        assert_eq!(Arc::strong_count(&context), 73);
        assert!(sets.iter().all(|set| set.context().image == 7));
    }

    #[test]
    fn settings_carry_family_algorithm() {
        for params in Agast::grid() {
            assert_eq!(Agast::settings(&params).algorithm(), Algorithm::Agast);
        }
        let first = Sift::grid()[0];
        assert_eq!(Sift::settings(&first).algorithm(), Algorithm::Sift);
    }
}
