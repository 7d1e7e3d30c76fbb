//! Per-pixel correspondence search between a target and a source level.
//!
//! A target pixel `(x, y)` with depth `d` is back-projected, mapped into the
//! source camera with the candidate pose and projected again. The pixel is a
//! valid correspondence only when
//!
//! - `d` is valid and inside `[min_depth, max_depth]`,
//! - the projection lands strictly inside the source image,
//! - the source depth at that location is valid on all four bilinear taps and
//!   inside the depth range,
//! - the transformed depth and the source depth differ by at most
//!   `max_depth_difference`.
//!
//! Rejected pixels are simply skipped; rejection is the normal outcome at
//! occlusions, depth holes and frustum borders.

use super::options::OdometryOptions;
use crate::image::BilinearTap;
use crate::pyramid::PyramidLevel;
use crate::rgbd::is_valid_depth;
use nalgebra::{Isometry3, Matrix3, Vector3};

/// Depth gates applied to every correspondence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthLimits {
    pub min_depth: f64,
    pub max_depth: f64,
    pub max_depth_difference: f64,
}

impl DepthLimits {
    pub fn from_options(opts: &OdometryOptions) -> Self {
        Self {
            min_depth: opts.min_depth,
            max_depth: opts.max_depth,
            max_depth_difference: opts.max_depth_difference,
        }
    }

    #[inline]
    fn in_range(&self, d: f64) -> bool {
        d >= self.min_depth && d <= self.max_depth
    }
}

/// One accepted target → source pairing under the current pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence {
    /// Target pixel column.
    pub x: usize,
    /// Target pixel row.
    pub y: usize,
    /// Target point expressed in the source camera frame.
    pub q: Vector3<f64>,
    /// Bilinear lookup at the projected source location.
    pub tap: BilinearTap,
    /// Interpolated source depth at the projected location.
    pub source_depth: f64,
}

impl Correspondence {
    /// Projected sub-pixel location in the source image.
    pub fn source_uv(&self) -> (f64, f64) {
        (
            self.tap.x0 as f64 + self.tap.ax,
            self.tap.y0 as f64 + self.tap.ay,
        )
    }
}

/// Evaluates correspondences of one level pair at a fixed pose.
#[derive(Clone, Debug)]
pub struct CorrespondenceEvaluator<'a> {
    pub source: &'a PyramidLevel,
    pub target: &'a PyramidLevel,
    pub limits: DepthLimits,
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl<'a> CorrespondenceEvaluator<'a> {
    /// Both levels must share resolution and intrinsics.
    pub fn new(
        source: &'a PyramidLevel,
        target: &'a PyramidLevel,
        pose: &Isometry3<f64>,
        limits: DepthLimits,
    ) -> Self {
        Self {
            source,
            target,
            limits,
            rotation: pose.rotation.to_rotation_matrix().into_inner(),
            translation: pose.translation.vector,
        }
    }

    /// Number of target pixels considered per evaluation.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.target.pixel_count()
    }

    /// Evaluate target pixel `(x, y)`.
    #[inline]
    pub fn evaluate(&self, x: usize, y: usize) -> Option<Correspondence> {
        let d_t = self.target.depth.get(x, y);
        if !is_valid_depth(d_t) || !self.limits.in_range(d_t as f64) {
            return None;
        }
        let k = &self.target.intrinsics;
        let p = k.back_project(x as f64, y as f64, d_t as f64);
        let q = self.rotation * p.coords + self.translation;
        let (u, v) = self.source.intrinsics.project(&q)?;
        let tap = BilinearTap::new(u, v, self.source.width(), self.source.height())?;
        let source_depth = tap.sample_depth(&self.source.depth)?;
        if !self.limits.in_range(source_depth) {
            return None;
        }
        if (q.z - source_depth).abs() > self.limits.max_depth_difference {
            return None;
        }
        Some(Correspondence {
            x,
            y,
            q,
            tap,
            source_depth,
        })
    }

    /// Visit every valid correspondence in target rows `rows`.
    pub fn for_each_in_rows(
        &self,
        rows: std::ops::Range<usize>,
        mut f: impl FnMut(&Correspondence),
    ) {
        let w = self.target.width();
        for y in rows {
            for x in 0..w {
                if let Some(c) = self.evaluate(x, y) {
                    f(&c);
                }
            }
        }
    }

    /// Count of valid correspondences over the whole level.
    pub fn count_valid(&self) -> usize {
        let mut n = 0usize;
        self.for_each_in_rows(0..self.target.height(), |_| n += 1);
        n
    }
}
