#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod camera;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod odometry;
pub mod rgbd;
pub mod types;

// Building blocks: pyramid, gradients and Lie-group helpers.
pub mod config;
pub mod gradient;
pub mod pyramid;
pub mod se3;

// --- High-level re-exports -------------------------------------------------

// Main entry points + results.
pub use crate::odometry::{
    compute_rgbd_odometry, compute_rgbd_odometry_from_pyramids,
    compute_rgbd_odometry_with_diagnostics, OdometryOptions, ResidualFormulation,
};
pub use crate::types::OdometryResult;

// Diagnostics returned next to the result.
pub use crate::diagnostics::{OdometryReport, OdometryTrace};

pub use crate::camera::PinholeIntrinsics;
pub use crate::error::{LevelFailure, OdometryError};
pub use crate::rgbd::RgbdFrame;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use rgbd_odometry::prelude::*;
/// use nalgebra::Matrix4;
///
/// # fn main() -> Result<(), OdometryError> {
/// let (w, h) = (640usize, 480usize);
/// let gray = vec![128u8; w * h];
/// let depth = vec![1500u16; w * h];
/// let source = RgbdFrame::from_raw(w, h, &gray, &depth, 1000.0, 3.0)?;
/// let target = source.clone();
///
/// let result = compute_rgbd_odometry(
///     &source,
///     &target,
///     &PinholeIntrinsics::default(),
///     &Matrix4::identity(),
///     &OdometryOptions::default(),
/// )?;
/// println!("success={}\n{}", result.success, result.transform);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::camera::PinholeIntrinsics;
    pub use crate::error::OdometryError;
    pub use crate::odometry::{
        compute_rgbd_odometry, InformationKind, OdometryOptions, ResidualFormulation, SolverKind,
    };
    pub use crate::rgbd::RgbdFrame;
    pub use crate::types::OdometryResult;
}

// --- Stage-level API (for tools & advanced users) --------------------------

pub mod stages {
    pub use crate::odometry::{
        compute_rgbd_odometry_from_pyramids, optimize_level, CorrespondenceEvaluator,
        DepthLimits, LevelOutcome, LevelReport, NormalEquations,
    };
    pub use crate::pyramid::{build_pyramid, PyramidOptions, RgbdPyramid};

    pub use crate::diagnostics::{
        InputDescriptor, PyramidLevelReport, PyramidStage, StageTiming, TimingBreakdown,
    };
}
