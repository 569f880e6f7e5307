//! Annotated image output: region of interest and keypoints drawn over a
//! copy of the source image.

use std::path::{Path, PathBuf};

use image::RgbImage;
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::algorithm::Algorithm;
use crate::detection::KeyPoint;
use crate::region::RegionOfInterest;
use crate::report::ReportError;

pub mod colors {
    use image::Rgb;

    pub const REGION: Rgb<u8> = Rgb([0, 255, 0]);
    pub const KEYPOINT: Rgb<u8> = Rgb([255, 50, 50]);
    pub const CENTER: Rgb<u8> = Rgb([255, 255, 0]);
}

const MIN_KEYPOINT_RADIUS: i32 = 2;

/// Drawing collaborator. Implementations mutate only the image they are given.
pub trait Annotator: Send + Sync {
    fn draw_rectangle_on(&self, image: &mut RgbImage, region: &RegionOfInterest);

    fn draw_keypoints_on(&self, image: &mut RgbImage, keypoints: &[KeyPoint]);

    /// Draws on a clone; `source` is left untouched.
    fn render(&self, source: &RgbImage, region: &RegionOfInterest, keypoints: &[KeyPoint]) -> RgbImage {
        let mut image = source.clone();
        self.draw_rectangle_on(&mut image, region);
        self.draw_keypoints_on(&mut image, keypoints);
        image
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAnnotator;

impl Annotator for ImageAnnotator {
    fn draw_rectangle_on(&self, image: &mut RgbImage, region: &RegionOfInterest) {
        if region.width <= 0 || region.height <= 0 {
            return;
        }

        let rect = Rect::at(region.x, region.y).of_size(region.width as u32, region.height as u32);
        draw_hollow_rect_mut(image, rect, colors::REGION);
    }

    fn draw_keypoints_on(&self, image: &mut RgbImage, keypoints: &[KeyPoint]) {
        for keypoint in keypoints.iter().filter(|k| k.position.is_finite()) {
            let cx = keypoint.position.x.round() as i32;
            let cy = keypoint.position.y.round() as i32;
            let radius = ((keypoint.size / 2.0).round() as i32).max(MIN_KEYPOINT_RADIUS);

            draw_hollow_circle_mut(image, (cx, cy), radius, colors::KEYPOINT);
            draw_cross_mut(image, colors::CENTER, cx, cy);
        }
    }
}

/// `<basename>-<ALGORITHM>-<iteration>.jpg`
pub fn annotated_file_name(file_name: &str, algorithm: Algorithm, iteration: usize) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);

    format!("{stem}-{algorithm}-{iteration}.jpg")
}

/// Renders and saves one annotated image into `output_dir`.
pub fn write_annotated(
    annotator: &dyn Annotator,
    output_dir: &Path,
    output_file_name: &str,
    source: &RgbImage,
    region: &RegionOfInterest,
    keypoints: &[KeyPoint],
) -> Result<PathBuf, ReportError> {
    let path = output_dir.join(output_file_name);
    let image = annotator.render(source, region, keypoints);

    image.save(&path).map_err(|source| ReportError::Image {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
