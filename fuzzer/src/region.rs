use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::detection::KeyPoint;

/// Axis-aligned rectangle in image pixel coordinates.
///
/// Coordinates follow the image convention: the origin is the top-left pixel
/// and `y` grows downwards. `top` is therefore `y` and `bottom` is
/// `y + height`, the numerically larger bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegionOfInterest {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl RegionOfInterest {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x as f64
    }

    pub fn right(&self) -> f64 {
        self.x as f64 + self.width as f64
    }

    pub fn top(&self) -> f64 {
        self.y as f64
    }

    pub fn bottom(&self) -> f64 {
        self.y as f64 + self.height as f64
    }

    /// Inclusive on all four edges. Non-finite points are never inside.
    pub fn contains(&self, point: Vec2) -> bool {
        let x = point.x as f64;
        let y = point.y as f64;

        self.left() <= x && x <= self.right() && self.top() <= y && y <= self.bottom()
    }

    pub fn count_inliers(&self, keypoints: &[KeyPoint]) -> usize {
        keypoints
            .iter()
            .filter(|keypoint| self.contains(keypoint.position))
            .count()
    }
}
