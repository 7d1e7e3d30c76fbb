use crate::pyramid::{valid_depth_fraction, RgbdPyramid};
use serde::{Deserialize, Serialize};

/// Statistics for a single level of an RGB-D pyramid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidLevelReport {
    pub level_index: usize,
    pub width: usize,
    pub height: usize,
    pub fx: f64,
    pub fy: f64,
    pub mean_intensity: f32,
    /// Fraction of pixels carrying valid depth.
    pub valid_depth_fraction: f32,
}

/// Pyramid construction details for one frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidStage {
    pub elapsed_ms: f64,
    pub levels: Vec<PyramidLevelReport>,
}

impl PyramidStage {
    pub fn from_pyramid(pyramid: &RgbdPyramid, elapsed_ms: f64) -> Self {
        let levels = pyramid
            .levels
            .iter()
            .map(|lvl| PyramidLevelReport {
                level_index: lvl.index,
                width: lvl.width(),
                height: lvl.height(),
                fx: lvl.intrinsics.fx,
                fy: lvl.intrinsics.fy,
                mean_intensity: lvl.intensity.mean_where(|_| true),
                // pyramid depth is already masked to the configured range
                valid_depth_fraction: valid_depth_fraction(lvl, 0.0, f32::MAX),
            })
            .collect();
        Self { elapsed_ms, levels }
    }
}
