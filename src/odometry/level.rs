//! Gauss-Newton / Levenberg-Marquardt iterations on one pyramid level.
//!
//! Each iteration solves the normal equations at the current pose, composes
//! the update on the left (`T ← exp(Δξ)·T`) and re-evaluates the mean cost at
//! the candidate pose. A candidate is accepted only if it keeps enough
//! correspondences and does not increase the mean cost, so the accepted cost
//! history is non-increasing.
//!
//! ```text
//! Start ──► Iterate ──► Converged       (small cost decrease / small step /
//!   │          │                         Gauss-Newton step rejected)
//!   │          ├──────► MaxIterReached  (budget spent)
//!   └──────────┴──────► Diverged        (too few correspondences at start,
//!                                        singular normal equations)
//! ```

use super::accumulator::{accumulate, NormalEquations};
use super::correspondence::{CorrespondenceEvaluator, DepthLimits};
use super::options::{OdometryOptions, SolverKind};
use super::residual::ResidualTerm;
use super::solver::solve_step;
use crate::error::LevelFailure;
use crate::pyramid::PyramidLevel;
use crate::se3;
use log::debug;
use nalgebra::{Isometry3, Matrix4};
use serde::Serialize;
use std::time::Instant;

/// Terminal state of a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOutcome {
    Converged,
    MaxIterReached,
    Diverged(LevelFailure),
}

impl LevelOutcome {
    pub fn is_diverged(&self) -> bool {
        matches!(self, LevelOutcome::Diverged(_))
    }
}

/// What happened on one level.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReport {
    pub level_index: usize,
    pub width: usize,
    pub height: usize,
    pub outcome: LevelOutcome,
    /// Linear solves performed (accepted and rejected steps).
    pub iterations: usize,
    /// Valid correspondences at the incoming pose.
    pub initial_valid: usize,
    /// Mean cost at the incoming pose (`+∞` without correspondences).
    pub initial_cost: f64,
    /// Mean cost at the outgoing pose.
    pub final_cost: f64,
    /// Mean cost at the incoming pose followed by every accepted step.
    pub cost_history: Vec<f64>,
    /// Valid correspondence fraction at the outgoing pose.
    pub valid_fraction: f64,
    /// Pose at the end of the level (the incoming pose when diverged).
    pub transform: Matrix4<f64>,
    pub elapsed_ms: f64,
}

/// Result of [`optimize_level`].
#[derive(Clone, Debug)]
pub struct LevelRun {
    pub pose: Isometry3<f64>,
    pub report: LevelReport,
}

/// Whether `ne` carries enough correspondences to be trusted.
pub fn has_enough_correspondences(ne: &NormalEquations, min_fraction: f64) -> bool {
    ne.valid > 0 && ne.valid_fraction() >= min_fraction
}

/// Refine `pose` on one source/target level pair with `term`.
///
/// The iteration budget comes from `options.iterations_for_level`. On
/// divergence the returned pose is the incoming one.
pub fn optimize_level<T: ResidualTerm>(
    source: &PyramidLevel,
    target: &PyramidLevel,
    term: &T,
    options: &OdometryOptions,
    initial: &Isometry3<f64>,
) -> LevelRun {
    let start = Instant::now();
    let level_index = target.index;
    let budget = options.iterations_for_level(level_index);
    let limits = DepthLimits::from_options(options);
    let evaluate = |pose: &Isometry3<f64>| {
        accumulate(&CorrespondenceEvaluator::new(source, target, pose, limits), term)
    };

    let mut pose = *initial;
    let mut ne = evaluate(&pose);
    let initial_valid = ne.valid;
    let initial_cost = ne.mean_cost();
    let mut cost = initial_cost;
    let mut cost_history = vec![cost];
    let mut iterations = 0usize;

    debug!(
        "optimize_level start level={} size={}x{} budget={} valid={}/{} cost={:.6e}",
        level_index,
        target.width(),
        target.height(),
        budget,
        ne.valid,
        ne.total,
        cost
    );

    let outcome = if !has_enough_correspondences(&ne, options.min_correspondence_fraction) {
        LevelOutcome::Diverged(LevelFailure::InsufficientCorrespondence {
            valid: ne.valid,
            total: ne.total,
        })
    } else {
        let mut mu = match options.solver {
            SolverKind::GaussNewton => 0.0,
            SolverKind::LevenbergMarquardt { initial_lambda, .. } => initial_lambda,
        };
        let mut outcome = LevelOutcome::MaxIterReached;
        while iterations < budget {
            iterations += 1;
            let delta = match solve_step(&ne, mu) {
                Ok(delta) => delta,
                Err(failure) => {
                    outcome = LevelOutcome::Diverged(failure);
                    break;
                }
            };
            let candidate = se3::exp(&delta) * pose;
            let trial = evaluate(&candidate);
            let trial_cost = trial.mean_cost();
            let accepted = has_enough_correspondences(&trial, options.min_correspondence_fraction)
                && trial_cost <= cost;

            debug!(
                "optimize_level level={} iter={} step={:.3e} valid={} cost={:.6e} -> {:.6e} {}",
                level_index,
                iterations,
                delta.norm(),
                trial.valid,
                cost,
                trial_cost,
                if accepted { "accepted" } else { "rejected" }
            );

            if !accepted {
                match options.solver {
                    SolverKind::GaussNewton => {
                        outcome = LevelOutcome::Converged;
                        break;
                    }
                    SolverKind::LevenbergMarquardt { lambda_up, .. } => {
                        mu *= lambda_up;
                        continue;
                    }
                }
            }

            let relative_decrease = if cost > 0.0 {
                (cost - trial_cost) / cost
            } else {
                0.0
            };
            pose = candidate;
            ne = trial;
            cost = trial_cost;
            cost_history.push(cost);
            if let SolverKind::LevenbergMarquardt { lambda_down, .. } = options.solver {
                mu *= lambda_down;
            }
            if relative_decrease < options.cost_tolerance
                || delta.norm() < options.update_tolerance
            {
                outcome = LevelOutcome::Converged;
                break;
            }
        }
        outcome
    };

    let (final_cost, valid_fraction) = if outcome.is_diverged() {
        pose = *initial;
        (initial_cost, initial_valid as f64 / ne.total.max(1) as f64)
    } else {
        (cost, ne.valid_fraction())
    };
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    debug!(
        "optimize_level done level={} outcome={:?} iterations={} cost={:.6e} valid_fraction={:.3} ({:.2} ms)",
        level_index,
        outcome,
        iterations,
        final_cost,
        valid_fraction,
        elapsed_ms
    );

    LevelRun {
        pose,
        report: LevelReport {
            level_index,
            width: target.width(),
            height: target.height(),
            outcome,
            iterations,
            initial_valid,
            initial_cost,
            final_cost,
            cost_history,
            valid_fraction,
            transform: pose.to_homogeneous(),
            elapsed_ms,
        },
    }
}
