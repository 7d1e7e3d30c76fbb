//! Configuration of a single odometry call.
//!
//! Options are an explicit value passed to every call; nothing is read from
//! globals, so identical inputs reproduce identical results. Call
//! [`OdometryOptions::validate`] (the entry points do) before use.

use super::robust::{RobustKind, RobustOptions};
use crate::error::{OdometryError, Result};
use crate::pyramid::PyramidOptions;
use serde::{Deserialize, Serialize};

/// Residual formulation applied at every pixel and level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualFormulation {
    /// Photometric residual only.
    Intensity,
    /// Geometric (depth) residual only.
    Depth,
    /// Both residuals stacked, two rows per pixel.
    #[default]
    Hybrid,
}

/// Step computation strategy inside a level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverKind {
    /// Undamped Gauss-Newton; the level stops at the first step that does not
    /// decrease the cost.
    #[default]
    GaussNewton,
    /// Marquardt-damped steps `(H + λ·diag(H)) Δ = -b`; rejected steps raise λ
    /// and are retried.
    LevenbergMarquardt {
        initial_lambda: f64,
        lambda_up: f64,
        lambda_down: f64,
    },
}

impl SolverKind {
    pub fn levenberg_marquardt() -> Self {
        SolverKind::LevenbergMarquardt {
            initial_lambda: 1e-4,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Source of the returned information matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InformationKind {
    /// Undamped normal-equations matrix of the chosen formulation at the
    /// final pose.
    #[default]
    Hessian,
    /// `GᵀG` over the final correspondences, each contributing the 3×6
    /// point-to-point block `[-[q]× | I]`.
    PointToPoint,
}

/// Options of one odometry call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryOptions {
    /// Number of pyramid levels.
    pub pyramid_levels: usize,
    /// Iteration budget per level, ordered coarsest → finest.
    pub iterations_per_level: Vec<usize>,
    /// Minimum valid depth (metres, inclusive).
    pub min_depth: f64,
    /// Maximum valid depth (metres, inclusive).
    pub max_depth: f64,
    /// Correspondences whose depths disagree by more than this are rejected.
    pub max_depth_difference: f64,
    /// Fraction of a level's pixels that must yield correspondences.
    pub min_correspondence_fraction: f64,
    pub residual_formulation: ResidualFormulation,
    /// Cost weight of the photometric term.
    pub intensity_weight: f64,
    /// Cost weight of the geometric term.
    pub depth_weight: f64,
    /// Multiplier turning Sobel responses into per-pixel derivatives.
    pub gradient_scale: f64,
    pub robust_loss: RobustOptions,
    pub solver: SolverKind,
    /// Relative mean-cost decrease below which a level is converged.
    pub cost_tolerance: f64,
    /// Update norm `‖Δξ‖` below which a level is converged.
    pub update_tolerance: f64,
    pub information: InformationKind,
    /// Depth jump (metres) treated as an occlusion edge when down-sampling.
    pub depth_discontinuity: f64,
}

impl Default for OdometryOptions {
    fn default() -> Self {
        Self {
            pyramid_levels: 3,
            iterations_per_level: vec![20, 10, 5],
            min_depth: 0.0,
            max_depth: 4.0,
            max_depth_difference: 0.03,
            min_correspondence_fraction: 0.1,
            residual_formulation: ResidualFormulation::Hybrid,
            intensity_weight: 0.032,
            depth_weight: 0.968,
            gradient_scale: 0.125,
            robust_loss: RobustOptions::default(),
            solver: SolverKind::GaussNewton,
            cost_tolerance: 1e-6,
            update_tolerance: 1e-7,
            information: InformationKind::Hessian,
            depth_discontinuity: 0.1,
        }
    }
}

impl OdometryOptions {
    pub fn with_formulation(mut self, formulation: ResidualFormulation) -> Self {
        self.residual_formulation = formulation;
        self
    }

    /// Set the per-level budgets (coarsest first); also sets the level count.
    pub fn with_iterations(mut self, iterations_per_level: Vec<usize>) -> Self {
        self.pyramid_levels = iterations_per_level.len();
        self.iterations_per_level = iterations_per_level;
        self
    }

    pub fn with_depth_range(mut self, min_depth: f64, max_depth: f64) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Iteration budget for pyramid level `level` (0 = finest).
    pub fn iterations_for_level(&self, level: usize) -> usize {
        self.pyramid_levels
            .checked_sub(level + 1)
            .and_then(|i| self.iterations_per_level.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Pyramid construction options implied by these odometry options.
    pub fn pyramid_options(&self) -> PyramidOptions {
        let mut opts = PyramidOptions::new(self.pyramid_levels)
            .with_depth_range(self.min_depth as f32, self.max_depth as f32);
        opts.gradient_scale = self.gradient_scale as f32;
        opts.depth_discontinuity = self.depth_discontinuity as f32;
        opts
    }

    /// Check ranges and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(OdometryError::InvalidOptions(msg));
        if self.pyramid_levels == 0 {
            return invalid("pyramid_levels must be at least 1".to_string());
        }
        if self.iterations_per_level.len() != self.pyramid_levels {
            return invalid(format!(
                "iterations_per_level has {} entries for {} pyramid levels",
                self.iterations_per_level.len(),
                self.pyramid_levels
            ));
        }
        if !(self.min_depth.is_finite() && self.min_depth >= 0.0) {
            return invalid(format!("min_depth must be >= 0, got {}", self.min_depth));
        }
        if !(self.max_depth.is_finite() && self.max_depth > self.min_depth) {
            return invalid(format!(
                "max_depth ({}) must exceed min_depth ({})",
                self.max_depth, self.min_depth
            ));
        }
        if !(self.max_depth_difference.is_finite() && self.max_depth_difference > 0.0) {
            return invalid(format!(
                "max_depth_difference must be positive, got {}",
                self.max_depth_difference
            ));
        }
        if !(0.0..=1.0).contains(&self.min_correspondence_fraction) {
            return invalid(format!(
                "min_correspondence_fraction must lie in [0, 1], got {}",
                self.min_correspondence_fraction
            ));
        }
        let uses_intensity = self.residual_formulation != ResidualFormulation::Depth;
        let uses_depth = self.residual_formulation != ResidualFormulation::Intensity;
        for (name, weight, used) in [
            ("intensity_weight", self.intensity_weight, uses_intensity),
            ("depth_weight", self.depth_weight, uses_depth),
        ] {
            if used && !(weight.is_finite() && weight > 0.0) {
                return invalid(format!("{name} must be positive, got {weight}"));
            }
        }
        if !(self.gradient_scale.is_finite() && self.gradient_scale > 0.0) {
            return invalid(format!(
                "gradient_scale must be positive, got {}",
                self.gradient_scale
            ));
        }
        if self.robust_loss.kind != RobustKind::None {
            let r = &self.robust_loss;
            if !(r.intensity_threshold > 0.0 && r.depth_threshold > 0.0) {
                return invalid(format!(
                    "robust thresholds must be positive, got intensity={} depth={}",
                    r.intensity_threshold, r.depth_threshold
                ));
            }
        }
        if let SolverKind::LevenbergMarquardt {
            initial_lambda,
            lambda_up,
            lambda_down,
        } = self.solver
        {
            if !(initial_lambda > 0.0 && lambda_up > 1.0 && lambda_down > 0.0 && lambda_down < 1.0)
            {
                return invalid(format!(
                    "invalid damping schedule: initial={initial_lambda} up={lambda_up} down={lambda_down}"
                ));
            }
        }
        if !(self.cost_tolerance >= 0.0 && self.update_tolerance >= 0.0) {
            return invalid("convergence tolerances must be non-negative".to_string());
        }
        if !(self.depth_discontinuity > 0.0) {
            return invalid(format!(
                "depth_discontinuity must be positive, got {}",
                self.depth_discontinuity
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_schedule_coarse_first() {
        let opts = OdometryOptions::default();
        opts.validate().expect("defaults validate");
        assert_eq!(opts.iterations_for_level(2), 20);
        assert_eq!(opts.iterations_for_level(1), 10);
        assert_eq!(opts.iterations_for_level(0), 5);
        assert_eq!(opts.iterations_for_level(3), 0);
    }

    #[test]
    fn level_count_must_match_budgets() {
        let mut opts = OdometryOptions::default();
        opts.pyramid_levels = 4;
        assert!(matches!(
            opts.validate(),
            Err(OdometryError::InvalidOptions(_))
        ));
        let opts = OdometryOptions::default().with_iterations(vec![8, 4]);
        assert_eq!(opts.pyramid_levels, 2);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_ranges_and_weights() {
        let opts = OdometryOptions::default().with_depth_range(2.0, 1.0);
        assert!(opts.validate().is_err());

        let mut opts = OdometryOptions::default();
        opts.min_correspondence_fraction = 1.5;
        assert!(opts.validate().is_err());

        let mut opts = OdometryOptions::default().with_formulation(ResidualFormulation::Depth);
        opts.intensity_weight = 0.0;
        assert!(opts.validate().is_ok());
        opts.depth_weight = -1.0;
        assert!(opts.validate().is_err());

        let opts = OdometryOptions::default().with_solver(SolverKind::LevenbergMarquardt {
            initial_lambda: 1e-3,
            lambda_up: 0.5,
            lambda_down: 0.1,
        });
        assert!(opts.validate().is_err());
    }

    #[test]
    fn deserializes_partial_json_over_defaults() {
        let json = r#"{
            "iterations_per_level": [30, 15, 8, 4],
            "pyramid_levels": 4,
            "residual_formulation": "intensity",
            "solver": { "kind": "levenberg_marquardt", "initial_lambda": 0.001, "lambda_up": 4.0, "lambda_down": 0.5 },
            "robust_loss": { "kind": "tukey" }
        }"#;
        let opts: OdometryOptions = serde_json::from_str(json).expect("parse");
        assert_eq!(opts.pyramid_levels, 4);
        assert_eq!(opts.residual_formulation, ResidualFormulation::Intensity);
        assert_eq!(opts.robust_loss.kind, RobustKind::Tukey);
        assert_eq!(opts.robust_loss.depth_threshold, 0.02);
        assert!(matches!(opts.solver, SolverKind::LevenbergMarquardt { .. }));
        assert_eq!(opts.max_depth_difference, 0.03);
        opts.validate().expect("valid");
    }
}
