//! Sub-pixel lookups used by the correspondence evaluator.
//!
//! A [`BilinearTap`] is resolved once per projected location and then reused
//! for every channel sampled there (intensity, depth, gradients). Locations
//! must lie strictly inside the image so that all four neighbours exist;
//! anything else is reported as out of bounds (`None`).
//!
//! Depth is special: a depth lookup is valid only when all four taps carry
//! valid depth. Blending with the missing-depth sentinel would synthesize
//! surfaces that were never observed.

use super::ImageF32;
use crate::rgbd::is_valid_depth;

/// Integer anchor and fractional weights of a bilinear lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BilinearTap {
    pub x0: usize,
    pub y0: usize,
    pub ax: f64,
    pub ay: f64,
}

impl BilinearTap {
    /// Resolve the tap for `(u, v)` on a `w × h` grid, requiring
    /// `0 <= u < w - 1` and `0 <= v < h - 1`.
    #[inline]
    pub fn new(u: f64, v: f64, w: usize, h: usize) -> Option<Self> {
        if w < 2 || h < 2 || !u.is_finite() || !v.is_finite() {
            return None;
        }
        if u < 0.0 || v < 0.0 || u >= (w - 1) as f64 || v >= (h - 1) as f64 {
            return None;
        }
        let x0 = u.floor() as usize;
        let y0 = v.floor() as usize;
        Some(Self {
            x0,
            y0,
            ax: u - x0 as f64,
            ay: v - y0 as f64,
        })
    }

    #[inline]
    fn corners(&self, img: &ImageF32) -> [f64; 4] {
        let i = img.idx(self.x0, self.y0);
        let s = img.stride;
        [
            img.data[i] as f64,
            img.data[i + 1] as f64,
            img.data[i + s] as f64,
            img.data[i + s + 1] as f64,
        ]
    }

    #[inline]
    fn blend(&self, c: [f64; 4]) -> f64 {
        let top = c[0] + (c[1] - c[0]) * self.ax;
        let bottom = c[2] + (c[3] - c[2]) * self.ax;
        top + (bottom - top) * self.ay
    }

    /// Bilinear sample of a dense channel (intensity or gradient).
    #[inline]
    pub fn sample(&self, img: &ImageF32) -> f64 {
        self.blend(self.corners(img))
    }

    /// Bilinear sample of a channel that may contain NaN holes (depth
    /// gradients); `None` when any tap is non-finite.
    #[inline]
    pub fn sample_finite(&self, img: &ImageF32) -> Option<f64> {
        let c = self.corners(img);
        c.iter().all(|v| v.is_finite()).then(|| self.blend(c))
    }

    /// Bilinear depth sample; `None` unless every tap is valid depth.
    #[inline]
    pub fn sample_depth(&self, depth: &ImageF32) -> Option<f64> {
        let c = self.corners(depth);
        c.iter()
            .all(|&d| is_valid_depth(d as f32))
            .then(|| self.blend(c))
    }
}
