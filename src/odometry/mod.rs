//! Pyramidal RGB-D odometry.
//!
//! Estimates the rigid transform `T` mapping target-camera points into the
//! source camera frame by minimising photometric and/or geometric residuals
//! over an image pyramid, coarsest level first.
//!
//! Components, leaf first:
//! - [`correspondence`]: re-projects target pixels into the source frame and
//!   gates them on depth range, image bounds and depth agreement.
//! - [`residual`]: intensity, depth and hybrid residuals with analytic
//!   Jacobians, selected once per call as a type parameter.
//! - [`accumulator`]: robustly weighted normal equations, reduced over row
//!   bands in a fixed order.
//! - [`solver`]: damped or undamped Cholesky step.
//! - [`level`]: iterations on one level with step acceptance and the
//!   Converged / Diverged / MaxIterReached outcome.
//! - [`driver`]: validation, pyramids, level scheduling, success check and
//!   the information matrix at the final pose.
//!
//! Typical usage:
//! ```no_run
//! use rgbd_odometry::prelude::*;
//! use nalgebra::Matrix4;
//!
//! # fn example(source: RgbdFrame, target: RgbdFrame) -> Result<(), OdometryError> {
//! let intrinsics = PinholeIntrinsics::default();
//! let options = OdometryOptions::default();
//! let result = compute_rgbd_odometry(&source, &target, &intrinsics, &Matrix4::identity(), &options)?;
//! if result.success {
//!     println!("motion:\n{}", result.transform);
//! }
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod correspondence;
pub mod driver;
pub mod level;
pub mod options;
pub mod residual;
pub mod robust;
pub mod solver;

pub use accumulator::NormalEquations;
pub use correspondence::{Correspondence, CorrespondenceEvaluator, DepthLimits};
pub use driver::{
    compute_rgbd_odometry, compute_rgbd_odometry_from_pyramids,
    compute_rgbd_odometry_with_diagnostics,
};
pub use level::{optimize_level, LevelOutcome, LevelReport, LevelRun};
pub use options::{InformationKind, OdometryOptions, ResidualFormulation, SolverKind};
pub use residual::{DepthTerm, HybridTerm, IntensityTerm, ResidualTerm};
pub use robust::{RobustKind, RobustLoss, RobustOptions};
