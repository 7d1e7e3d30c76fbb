//! Pinhole camera intrinsics and per-level scaling.
use crate::error::{OdometryError, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics in pixel units for a `width × height` image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    pub width: usize,
    pub height: usize,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Default for PinholeIntrinsics {
    /// PrimeSense / Kinect v1 default at VGA resolution.
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fx: 525.0,
            fy: 525.0,
            cx: 319.5,
            cy: 239.5,
        }
    }
}

impl PinholeIntrinsics {
    pub fn new(width: usize, height: usize, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx,
            cy,
        }
    }

    /// Reject non-positive focal lengths or resolution and non-finite values.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OdometryError::InvalidIntrinsics(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let finite = [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.fx <= 0.0 || self.fy <= 0.0 {
            return Err(OdometryError::InvalidIntrinsics(format!(
                "fx={} fy={} cx={} cy={}",
                self.fx, self.fy, self.cx, self.cy
            )));
        }
        Ok(())
    }

    /// Intrinsics for pyramid level `level` (level 0 is full resolution).
    ///
    /// Focal lengths and principal point are divided by `2^level`; the
    /// resolution follows the decimation rule `ceil(n / 2)` per level.
    pub fn scaled(&self, level: usize) -> Self {
        let s = 1.0 / (1u64 << level) as f64;
        let mut width = self.width;
        let mut height = self.height;
        for _ in 0..level {
            width = width.div_ceil(2);
            height = height.div_ceil(2);
        }
        Self {
            width,
            height,
            fx: self.fx * s,
            fy: self.fy * s,
            cx: self.cx * s,
            cy: self.cy * s,
        }
    }

    /// Back-project pixel `(u, v)` at metric depth `z`.
    #[inline]
    pub fn back_project(&self, u: f64, v: f64, z: f64) -> Point3<f64> {
        Point3::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// Project a camera-frame point; `None` when it lies on or behind the
    /// image plane.
    #[inline]
    pub fn project(&self, p: &Vector3<f64>) -> Option<(f64, f64)> {
        if !(p.z > 0.0) {
            return None;
        }
        let inv_z = 1.0 / p.z;
        Some((self.fx * p.x * inv_z + self.cx, self.fy * p.y * inv_z + self.cy))
    }
}
