//! Reduction of per-pixel rows into 6×6 normal equations.
//!
//! Each row contributes `λ·w·J Jᵀ` to the Hessian approximation, `λ·w·J r` to
//! the gradient and `λ·ρ(r)` to the cost, where `λ` is the formulation weight
//! and `w`, `ρ` come from the robust loss evaluated on the raw residual. The
//! Hessian is therefore exactly linear in `λ`.
//!
//! Pixels are split into fixed bands of target rows. Every band is reduced
//! independently (in parallel with the `parallel` feature) and the partial
//! systems are merged in band order, so the floating-point result does not
//! depend on thread scheduling.

use super::correspondence::CorrespondenceEvaluator;
use super::residual::ResidualTerm;
use super::robust::RobustLoss;
use crate::se3::skew;
use nalgebra::{Matrix3x6, Matrix6, Vector6};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Target rows per reduction band.
pub const BAND_ROWS: usize = 16;

/// Accumulated normal equations `H Δ = -b` of one pose evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalEquations {
    pub hessian: Matrix6<f64>,
    pub gradient: Vector6<f64>,
    /// Weighted robust cost `Σ λ·ρ(r)`.
    pub cost: f64,
    /// Correspondences that contributed at least one row.
    pub valid: usize,
    /// Pixels examined.
    pub total: usize,
}

impl Default for NormalEquations {
    fn default() -> Self {
        Self {
            hessian: Matrix6::zeros(),
            gradient: Vector6::zeros(),
            cost: 0.0,
            valid: 0,
            total: 0,
        }
    }
}

impl NormalEquations {
    /// Add one residual row with formulation weight `weight`.
    #[inline]
    pub fn add_row(&mut self, j: &Vector6<f64>, r: f64, weight: f64, loss: RobustLoss) {
        let w = weight * loss.weight(r);
        self.hessian += (j * j.transpose()) * w;
        self.gradient += j * (w * r);
        self.cost += weight * loss.rho(r);
    }

    /// Fold another partial system into this one.
    pub fn merge(&mut self, other: &NormalEquations) {
        self.hessian += other.hessian;
        self.gradient += other.gradient;
        self.cost += other.cost;
        self.valid += other.valid;
        self.total += other.total;
    }

    /// Mean weighted cost per valid correspondence (`+∞` when none).
    pub fn mean_cost(&self) -> f64 {
        if self.valid == 0 {
            f64::INFINITY
        } else {
            self.cost / self.valid as f64
        }
    }

    pub fn valid_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64
        }
    }
}

/// Reduce `band(rows)` over all row bands of a `height`-row image in band
/// order.
fn reduce_bands<F>(height: usize, band: F) -> NormalEquations
where
    F: Fn(std::ops::Range<usize>) -> NormalEquations + Sync,
{
    let bands: Vec<std::ops::Range<usize>> = (0..height)
        .step_by(BAND_ROWS)
        .map(|y0| y0..(y0 + BAND_ROWS).min(height))
        .collect();

    #[cfg(feature = "parallel")]
    let partials: Vec<NormalEquations> = bands.into_par_iter().map(&band).collect();
    #[cfg(not(feature = "parallel"))]
    let partials: Vec<NormalEquations> = bands.into_iter().map(&band).collect();

    partials
        .iter()
        .fold(NormalEquations::default(), |mut acc, part| {
            acc.merge(part);
            acc
        })
}

/// Evaluate every target pixel at the evaluator's pose and accumulate the
/// rows of `term`.
pub fn accumulate<T: ResidualTerm>(
    eval: &CorrespondenceEvaluator<'_>,
    term: &T,
) -> NormalEquations {
    let width = eval.target.width();
    reduce_bands(eval.target.height(), |rows| {
        let mut ne = NormalEquations {
            total: rows.len() * width,
            ..NormalEquations::default()
        };
        eval.for_each_in_rows(rows, |c| {
            if term.linearize(eval, c, &mut ne) {
                ne.valid += 1;
            }
        });
        ne
    })
}

/// Point-to-point information `Σ GᵀG` over the valid correspondences, with
/// `G = [-[q]× | I]` the Jacobian of the transformed point under a left
/// perturbation. Only `hessian`, `valid` and `total` are filled.
pub fn point_to_point_information(eval: &CorrespondenceEvaluator<'_>) -> NormalEquations {
    let width = eval.target.width();
    reduce_bands(eval.target.height(), |rows| {
        let mut ne = NormalEquations {
            total: rows.len() * width,
            ..NormalEquations::default()
        };
        eval.for_each_in_rows(rows, |c| {
            let mut g = Matrix3x6::zeros();
            g.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-skew(&c.q)));
            g.fixed_view_mut::<3, 3>(0, 3).fill_with_identity();
            ne.hessian += g.transpose() * g;
            ne.valid += 1;
        });
        ne
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeIntrinsics;
    use crate::image::ImageF32;
    use crate::odometry::correspondence::DepthLimits;
    use crate::odometry::residual::{DepthTerm, HybridTerm, IntensityTerm};
    use crate::pyramid::{PyramidOptions, RgbdPyramid};
    use crate::rgbd::RgbdFrame;
    use crate::se3;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Vector3};

    const LIMITS: DepthLimits = DepthLimits {
        min_depth: 0.1,
        max_depth: 4.0,
        max_depth_difference: 0.07,
    };

    fn scene() -> RgbdPyramid {
        let (w, h) = (80, 60);
        let k = PinholeIntrinsics::new(w, h, 70.0, 70.0, 39.5, 29.5);
        let intensity = ImageF32::from_fn(w, h, |x, y| {
            0.5 + 0.3 * (0.23 * x as f32).sin() * (0.19 * y as f32 + 0.4).cos()
        });
        let depth = ImageF32::from_fn(w, h, |x, y| {
            if x > 50 && y > 40 {
                0.0
            } else {
                2.0 + 0.006 * x as f32 - 0.003 * y as f32
            }
        });
        let frame = RgbdFrame::new(intensity, depth).expect("frame");
        RgbdPyramid::build(&frame, &k, &PyramidOptions::new(1)).expect("pyramid")
    }

    fn moved() -> Isometry3<f64> {
        se3::exp(&Vector6::new(0.003, 0.002, -0.004, 0.02, -0.01, 0.015))
    }

    #[test]
    fn band_reduction_matches_a_single_pass() {
        let pyr = scene();
        let lvl = &pyr.levels[0];
        let pose = moved();
        let eval = CorrespondenceEvaluator::new(lvl, lvl, &pose, LIMITS);
        let term = HybridTerm::from_options(&Default::default());
        let banded = accumulate(&eval, &term);

        let mut single = NormalEquations {
            total: lvl.pixel_count(),
            ..NormalEquations::default()
        };
        eval.for_each_in_rows(0..lvl.height(), |c| {
            if term.linearize(&eval, c, &mut single) {
                single.valid += 1;
            }
        });
        assert_eq!(banded.valid, single.valid);
        assert_eq!(banded.total, 80 * 60);
        assert!(banded.valid > 1000);
        assert_relative_eq!(banded.hessian, single.hessian, max_relative = 1e-10, epsilon = 1e-8);
        assert_relative_eq!(banded.gradient, single.gradient, max_relative = 1e-9, epsilon = 1e-9);
        assert_relative_eq!(banded.cost, single.cost, max_relative = 1e-10);
    }

    #[test]
    fn accumulation_is_deterministic() {
        let pyr = scene();
        let lvl = &pyr.levels[0];
        let pose = moved();
        let eval = CorrespondenceEvaluator::new(lvl, lvl, &pose, LIMITS);
        let term = HybridTerm::from_options(&Default::default());
        let a = accumulate(&eval, &term);
        let b = accumulate(&eval, &term);
        assert_eq!(a, b);
    }

    #[test]
    fn hessian_is_linear_in_formulation_weight() {
        let pyr = scene();
        let lvl = &pyr.levels[0];
        let pose = moved();
        let eval = CorrespondenceEvaluator::new(lvl, lvl, &pose, LIMITS);
        let base = DepthTerm::from_options(&Default::default());
        let doubled = DepthTerm {
            weight: base.weight * 2.0,
            ..base
        };
        let a = accumulate(&eval, &base);
        let b = accumulate(&eval, &doubled);
        assert_relative_eq!(b.hessian, a.hessian * 2.0, max_relative = 1e-12);
        assert_relative_eq!(b.cost, a.cost * 2.0, max_relative = 1e-12);
        // the mean cost is still comparable between iterations
        assert_eq!(a.valid, b.valid);
    }

    #[test]
    fn hessian_is_symmetric_and_psd() {
        let pyr = scene();
        let lvl = &pyr.levels[0];
        let eval = CorrespondenceEvaluator::new(lvl, lvl, &moved(), LIMITS);
        let ne = accumulate(&eval, &IntensityTerm::from_options(&Default::default()));
        assert_relative_eq!(ne.hessian, ne.hessian.transpose(), epsilon = 1e-9);
        let eig = ne.hessian.symmetric_eigen();
        let scale = eig.eigenvalues.amax();
        assert!(eig.eigenvalues.iter().all(|&l| l > -1e-9 * scale));
    }

    #[test]
    fn point_to_point_blocks_count_each_correspondence() {
        let pyr = scene();
        let lvl = &pyr.levels[0];
        let eval = CorrespondenceEvaluator::new(lvl, lvl, &Isometry3::identity(), LIMITS);
        let info = point_to_point_information(&eval);
        assert_eq!(info.valid, eval.count_valid());
        // translation block is n·I
        let n = info.valid as f64;
        let t = info.hessian.fixed_view::<3, 3>(3, 3).into_owned();
        assert_relative_eq!(t, nalgebra::Matrix3::identity() * n, epsilon = 1e-9);
        // rotation block of a single point q is [q]×ᵀ[q]× = |q|²I - qqᵀ
        let q = Vector3::new(0.3, -0.2, 2.0);
        let s = skew(&q);
        assert_relative_eq!(
            s.transpose() * s,
            nalgebra::Matrix3::identity() * q.norm_squared() - q * q.transpose(),
            epsilon = 1e-12
        );
    }
}
