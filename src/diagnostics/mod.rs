//! Diagnostics data model returned next to the odometry result.
//!
//! `OdometryReport` is the entry point: it bundles the plain
//! [`OdometryResult`](crate::types::OdometryResult) with an `OdometryTrace`
//! covering pyramid statistics, per-level solver reports and timings. All
//! structures serialise to camelCase JSON for tooling.

pub mod pyramid;
pub mod report;
pub mod timing;

pub use pyramid::{PyramidLevelReport, PyramidStage};
pub use report::{InputDescriptor, OdometryReport, OdometryTrace};
pub use timing::{StageTiming, TimingBreakdown};
