//! RGB-D image pyramid with separable intensity blur and 2× decimation.
//!
//! Level 0 is the input frame at full resolution (depth masked to the
//! configured range). Each further level halves both dimensions:
//!
//! - intensity: optional separable blur (Gaussian by default), then every
//!   other pixel is kept;
//! - depth: edge-aware, validity-preserving average around the kept pixel;
//! - intrinsics: focal lengths and principal point halve.
//!
//! Every level also carries scaled Sobel derivatives of intensity and depth,
//! which the odometry samples at projected sub-pixel locations.

pub mod filters;
mod options;
mod pyramidbuild;

pub use filters::{StaticSeparableFilter, BINOMIAL_3TAP, GAUSSIAN_5TAP};
pub use options::PyramidOptions;
pub use pyramidbuild::{
    build_pyramid, valid_depth_fraction, PyramidLevel, PyramidResult, RgbdPyramid,
};
