//! Play area bounds
//!
//! Axis-aligned rectangle describing the visible play region. Supplied once
//! per session by whatever owns the camera/screen.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayAreaBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl PlayAreaBounds {
    /// Create bounds from two corners, in any order
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Bounds of the given size centered on the origin
    pub fn from_size(width: f32, height: f32) -> Self {
        let half = Vec2::new(width.abs() * 0.5, height.abs() * 0.5);
        Self::new(Vec2::ZERO - half, half)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Zero width or zero height
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Wrap a point that left the area back in from the opposite edge
    pub fn wrap(&self, point: Vec2) -> Vec2 {
        if self.is_degenerate() {
            return self.min;
        }
        let (w, h) = (self.width(), self.height());
        Vec2::new(
            self.min.x + (point.x - self.min.x).rem_euclid(w),
            self.min.y + (point.y - self.min.y).rem_euclid(h),
        )
    }

    /// Uniformly random point inside the area
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        if self.is_degenerate() {
            return self.min;
        }
        Vec2::new(
            rng.gen_range(self.min.x..self.max.x),
            rng.gen_range(self.min.y..self.max.y),
        )
    }
}

impl Default for PlayAreaBounds {
    fn default() -> Self {
        use crate::game::constants::session::{PLAY_AREA_HEIGHT, PLAY_AREA_WIDTH};
        Self::from_size(PLAY_AREA_WIDTH, PLAY_AREA_HEIGHT)
    }
}
