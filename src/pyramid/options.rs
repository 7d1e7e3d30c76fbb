use super::filters::{StaticSeparableFilter, GAUSSIAN_5TAP};

use serde::Deserialize;

/// Options controlling RGB-D pyramid construction.
#[derive(Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PyramidOptions {
    /// Number of pyramid levels (>= 1). Level 0 is full resolution.
    pub levels: usize,
    /// Number of initial downscale steps that blur intensity before
    /// decimation (`k >= levels` → blur everywhere, `0` → never).
    pub blur_levels: usize,
    /// Filter used for the separable intensity blur.
    #[serde(skip)]
    pub filter: StaticSeparableFilter,
    /// Multiplier turning Sobel responses into per-pixel derivatives.
    pub gradient_scale: f32,
    /// Depth taps further than this (metres) from the decimated centre sample
    /// are left out of the depth average, keeping occlusion edges sharp.
    pub depth_discontinuity: f32,
    /// Depth below this value (metres) is masked before down-sampling.
    pub min_depth: f32,
    /// Depth above this value (metres) is masked before down-sampling.
    pub max_depth: f32,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PyramidOptions {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            blur_levels: usize::MAX,
            filter: GAUSSIAN_5TAP,
            gradient_scale: 0.125,
            depth_discontinuity: 0.1,
            min_depth: 0.0,
            max_depth: f32::MAX,
        }
    }

    pub fn with_blur_levels(mut self, blur_levels: usize) -> Self {
        self.blur_levels = blur_levels;
        self
    }

    pub fn with_filter(mut self, filter: StaticSeparableFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

impl std::fmt::Debug for PyramidOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyramidOptions")
            .field("levels", &self.levels)
            .field("blur_levels", &self.blur_levels)
            .field("filter_taps", &self.filter.taps().len())
            .field("gradient_scale", &self.gradient_scale)
            .field("depth_discontinuity", &self.depth_discontinuity)
            .field("depth_range", &(self.min_depth, self.max_depth))
            .finish()
    }
}
