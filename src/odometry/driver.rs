//! Coarse-to-fine driver: input validation, pyramid construction, level
//! scheduling and the final information matrix.

use super::accumulator::{accumulate, point_to_point_information};
use super::correspondence::{CorrespondenceEvaluator, DepthLimits};
use super::level::{has_enough_correspondences, optimize_level};
use super::options::{InformationKind, OdometryOptions, ResidualFormulation};
use super::residual::{DepthTerm, HybridTerm, IntensityTerm, ResidualTerm};
use crate::camera::PinholeIntrinsics;
use crate::diagnostics::{
    InputDescriptor, OdometryReport, OdometryTrace, PyramidStage, StageTiming, TimingBreakdown,
};
use crate::error::{OdometryError, Result};
use crate::pyramid::{build_pyramid, RgbdPyramid};
use crate::rgbd::RgbdFrame;
use crate::se3::isometry_from_matrix;
use crate::types::OdometryResult;
use log::{debug, warn};
use nalgebra::{Isometry3, Matrix4};
use std::time::Instant;

/// Estimate the rigid motion between two RGB-D frames.
///
/// `initial` is the starting guess for the transform mapping target-camera
/// points into the source camera frame (usually the identity). Malformed
/// inputs fail fast with an [`OdometryError`]; numerical failures yield
/// `success == false` with the identity transform and a zero information
/// matrix.
pub fn compute_rgbd_odometry(
    source: &RgbdFrame,
    target: &RgbdFrame,
    intrinsics: &PinholeIntrinsics,
    initial: &Matrix4<f64>,
    options: &OdometryOptions,
) -> Result<OdometryResult> {
    compute_rgbd_odometry_with_diagnostics(source, target, intrinsics, initial, options)
        .map(|report| report.result)
}

/// [`compute_rgbd_odometry`] plus pyramid statistics, per-level reports and
/// timings.
pub fn compute_rgbd_odometry_with_diagnostics(
    source: &RgbdFrame,
    target: &RgbdFrame,
    intrinsics: &PinholeIntrinsics,
    initial: &Matrix4<f64>,
    options: &OdometryOptions,
) -> Result<OdometryReport> {
    let total_start = Instant::now();
    options.validate()?;
    intrinsics.validate()?;
    source.validate()?;
    target.validate()?;
    if source.width() != target.width() || source.height() != target.height() {
        return Err(OdometryError::DimensionMismatch(format!(
            "source is {}x{} but target is {}x{}",
            source.width(),
            source.height(),
            target.width(),
            target.height()
        )));
    }
    let initial = isometry_from_matrix(initial)?;
    for (name, frame) in [("source", source), ("target", target)] {
        let valid = frame.valid_depth_count();
        debug!(
            "compute_rgbd_odometry {} valid depth {}/{}",
            name,
            valid,
            frame.depth.len()
        );
        if valid == 0 {
            warn!("compute_rgbd_odometry {} frame carries no valid depth", name);
        }
    }

    let pyramid_options = options.pyramid_options();
    let source_pyr = build_pyramid(source, intrinsics, &pyramid_options)?;
    let target_pyr = build_pyramid(target, intrinsics, &pyramid_options)?;

    let mut report = run_levels(&source_pyr.pyramid, &target_pyr.pyramid, &initial, options);
    let trace = &mut report.trace;
    let mut stages = vec![
        StageTiming::new("pyramid_source", source_pyr.elapsed_ms),
        StageTiming::new("pyramid_target", target_pyr.elapsed_ms),
    ];
    stages.append(&mut trace.timings.stages);
    trace.timings.stages = stages;
    trace.source_pyramid = Some(PyramidStage::from_pyramid(
        &source_pyr.pyramid,
        source_pyr.elapsed_ms,
    ));
    trace.target_pyramid = Some(PyramidStage::from_pyramid(
        &target_pyr.pyramid,
        target_pyr.elapsed_ms,
    ));
    trace.timings.total_ms = total_start.elapsed().as_secs_f64() * 1000.0;
    Ok(report)
}

/// Odometry on pyramids built ahead of time (e.g. cached across calls).
///
/// Both pyramids must have `options.pyramid_levels` levels with matching
/// resolution and intrinsics per level.
pub fn compute_rgbd_odometry_from_pyramids(
    source: &RgbdPyramid,
    target: &RgbdPyramid,
    initial: &Matrix4<f64>,
    options: &OdometryOptions,
) -> Result<OdometryReport> {
    let total_start = Instant::now();
    options.validate()?;
    check_pyramids(source, target, options)?;
    let initial = isometry_from_matrix(initial)?;
    let mut report = run_levels(source, target, &initial, options);
    report.trace.timings.total_ms = total_start.elapsed().as_secs_f64() * 1000.0;
    Ok(report)
}

fn check_pyramids(
    source: &RgbdPyramid,
    target: &RgbdPyramid,
    options: &OdometryOptions,
) -> Result<()> {
    if source.len() != options.pyramid_levels || target.len() != options.pyramid_levels {
        return Err(OdometryError::InvalidOptions(format!(
            "pyramids have {} and {} levels, options request {}",
            source.len(),
            target.len(),
            options.pyramid_levels
        )));
    }
    for (s, t) in source.levels.iter().zip(&target.levels) {
        if s.width() != t.width() || s.height() != t.height() {
            return Err(OdometryError::DimensionMismatch(format!(
                "level {}: source {}x{} vs target {}x{}",
                s.index,
                s.width(),
                s.height(),
                t.width(),
                t.height()
            )));
        }
        if s.intrinsics != t.intrinsics {
            return Err(OdometryError::InvalidIntrinsics(format!(
                "level {}: source and target intrinsics differ",
                s.index
            )));
        }
        s.intrinsics.validate()?;
    }
    Ok(())
}

/// Pick the residual term once, then run the monomorphised level loop.
fn run_levels(
    source: &RgbdPyramid,
    target: &RgbdPyramid,
    initial: &Isometry3<f64>,
    options: &OdometryOptions,
) -> OdometryReport {
    match options.residual_formulation {
        ResidualFormulation::Intensity => {
            run_with_term(source, target, initial, options, &IntensityTerm::from_options(options))
        }
        ResidualFormulation::Depth => {
            run_with_term(source, target, initial, options, &DepthTerm::from_options(options))
        }
        ResidualFormulation::Hybrid => {
            run_with_term(source, target, initial, options, &HybridTerm::from_options(options))
        }
    }
}

fn run_with_term<T: ResidualTerm>(
    source: &RgbdPyramid,
    target: &RgbdPyramid,
    initial: &Isometry3<f64>,
    options: &OdometryOptions,
    term: &T,
) -> OdometryReport {
    let (width, height) = source
        .level(0)
        .map(|l| (l.width(), l.height()))
        .unwrap_or((0, 0));
    debug!(
        "compute_rgbd_odometry start w={} h={} levels={} formulation={:?} solver={:?}",
        width, height, options.pyramid_levels, options.residual_formulation, options.solver
    );

    let mut timings = TimingBreakdown::default();
    let mut level_reports = Vec::with_capacity(source.len());
    let mut pose = *initial;
    let coarsest = source.len().saturating_sub(1);

    for (src, tgt) in source.levels.iter().zip(&target.levels).rev() {
        let run = optimize_level(src, tgt, term, options, &pose);
        let report = run.report;
        if src.index == coarsest && report.initial_valid == 0 {
            warn!(
                "compute_rgbd_odometry initial guess yields no correspondences at level {}",
                src.index
            );
        }
        if report.outcome.is_diverged() {
            warn!(
                "compute_rgbd_odometry level {} diverged ({:?}); keeping the pose from before the level",
                src.index, report.outcome
            );
        }
        pose = run.pose;
        timings.push(format!("level_{}", src.index), report.elapsed_ms);
        level_reports.push(report);
    }

    let final_start = Instant::now();
    let finest_ok = level_reports
        .last()
        .map(|r| !r.outcome.is_diverged())
        .unwrap_or(false);
    let limits = DepthLimits::from_options(options);
    let final_eval = match (source.level(0), target.level(0)) {
        (Some(src), Some(tgt)) => Some(CorrespondenceEvaluator::new(src, tgt, &pose, limits)),
        _ => None,
    };
    let (result, final_valid_fraction, final_cost) = match final_eval {
        Some(eval) => {
            let ne = accumulate(&eval, term);
            let information = match options.information {
                InformationKind::Hessian => ne.hessian,
                InformationKind::PointToPoint => point_to_point_information(&eval).hessian,
            };
            let enough = has_enough_correspondences(&ne, options.min_correspondence_fraction);
            let finite = information.iter().all(|v| v.is_finite())
                && pose.to_homogeneous().iter().all(|v| v.is_finite());
            let result = if finest_ok && enough && finite {
                OdometryResult {
                    success: true,
                    transform: pose.to_homogeneous(),
                    information,
                }
            } else {
                warn!(
                    "compute_rgbd_odometry failed: finest_ok={} valid={}/{} (min fraction {})",
                    finest_ok, ne.valid, ne.total, options.min_correspondence_fraction
                );
                OdometryResult::failure()
            };
            (result, ne.valid_fraction(), ne.mean_cost())
        }
        None => (OdometryResult::failure(), 0.0, f64::INFINITY),
    };
    timings.push("information", final_start.elapsed().as_secs_f64() * 1000.0);
    timings.total_ms = timings.stage_sum_ms();

    debug!(
        "compute_rgbd_odometry done success={} valid_fraction={:.3} cost={:.6e}",
        result.success, final_valid_fraction, final_cost
    );

    OdometryReport {
        result,
        trace: OdometryTrace {
            input: InputDescriptor {
                width,
                height,
                pyramid_levels: source.len(),
                residual_formulation: options.residual_formulation,
                information: options.information,
            },
            timings,
            source_pyramid: None,
            target_pyramid: None,
            levels: level_reports,
            final_valid_fraction,
            final_cost,
        },
    }
}
