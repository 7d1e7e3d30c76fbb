//! Residual formulations and their analytic Jacobians.
//!
//! For a correspondence with transformed point `q = (x, y, z)` (source
//! camera frame) the pose Jacobian of any residual with spatial gradient
//! `g = ∂r/∂q` under a left perturbation `exp(δξ)·T` is the row
//!
//! ```text
//! J = [ q × g ; g ]        (rotation part first)
//! ```
//!
//! - Intensity: `r = I_s(π(q)) − I_t(x, y)`,
//!   `g = (c0, c1, −(c0·x + c1·y)/z)` with `c0 = ∂I/∂u·fx/z`, `c1 = ∂I/∂v·fy/z`.
//! - Depth: `r = z − D_s(π(q))`,
//!   `g = (−d0, −d1, 1 − d2)` with `d*` built from the depth gradient the same
//!   way.
//!
//! The formulation is a type parameter of the accumulation loop, so the
//! choice is made once per call and the per-pixel code is monomorphised.

use super::accumulator::NormalEquations;
use super::correspondence::{Correspondence, CorrespondenceEvaluator};
use super::options::OdometryOptions;
use super::robust::RobustLoss;
use crate::camera::PinholeIntrinsics;
use nalgebra::{Vector3, Vector6};

/// A residual formulation that turns correspondences into normal-equation
/// rows.
pub trait ResidualTerm: Sync {
    /// Add this term's rows for `c`. Returns `false` when no row could be
    /// formed (e.g. no depth gradient at the projected location), in which
    /// case the correspondence is not counted.
    fn linearize(
        &self,
        eval: &CorrespondenceEvaluator<'_>,
        c: &Correspondence,
        ne: &mut NormalEquations,
    ) -> bool;
}

/// Jacobian row of a residual with spatial gradient `g` at point `q`.
#[inline]
pub fn pose_jacobian(q: &Vector3<f64>, g: &Vector3<f64>) -> Vector6<f64> {
    let w = q.cross(g);
    Vector6::new(w.x, w.y, w.z, g.x, g.y, g.z)
}

/// Chain an image gradient `(gu, gv)` through the pinhole projection of `q`.
#[inline]
fn projected_gradient(k: &PinholeIntrinsics, q: &Vector3<f64>, gu: f64, gv: f64) -> Vector3<f64> {
    let inv_z = 1.0 / q.z;
    let c0 = gu * k.fx * inv_z;
    let c1 = gv * k.fy * inv_z;
    Vector3::new(c0, c1, -(c0 * q.x + c1 * q.y) * inv_z)
}

/// Photometric residual.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityTerm {
    pub weight: f64,
    pub loss: RobustLoss,
}

impl IntensityTerm {
    pub fn from_options(opts: &OdometryOptions) -> Self {
        Self {
            weight: opts.intensity_weight,
            loss: opts.robust_loss.intensity_loss(),
        }
    }

    /// Residual and Jacobian row for `c`.
    #[inline]
    pub fn row(
        &self,
        eval: &CorrespondenceEvaluator<'_>,
        c: &Correspondence,
    ) -> (f64, Vector6<f64>) {
        let src = eval.source;
        let r = c.tap.sample(&src.intensity) - eval.target.intensity.get(c.x, c.y) as f64;
        let gu = c.tap.sample(&src.intensity_grad.gx);
        let gv = c.tap.sample(&src.intensity_grad.gy);
        let g = projected_gradient(&src.intrinsics, &c.q, gu, gv);
        (r, pose_jacobian(&c.q, &g))
    }
}

impl ResidualTerm for IntensityTerm {
    #[inline]
    fn linearize(
        &self,
        eval: &CorrespondenceEvaluator<'_>,
        c: &Correspondence,
        ne: &mut NormalEquations,
    ) -> bool {
        let (r, j) = self.row(eval, c);
        ne.add_row(&j, r, self.weight, self.loss);
        true
    }
}

/// Geometric residual along the source viewing ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthTerm {
    pub weight: f64,
    pub loss: RobustLoss,
}

impl DepthTerm {
    pub fn from_options(opts: &OdometryOptions) -> Self {
        Self {
            weight: opts.depth_weight,
            loss: opts.robust_loss.depth_loss(),
        }
    }

    /// Residual and Jacobian row for `c`; `None` where the source depth
    /// gradient is undefined.
    #[inline]
    pub fn row(
        &self,
        eval: &CorrespondenceEvaluator<'_>,
        c: &Correspondence,
    ) -> Option<(f64, Vector6<f64>)> {
        let src = eval.source;
        let du = c.tap.sample_finite(&src.depth_grad.gx)?;
        let dv = c.tap.sample_finite(&src.depth_grad.gy)?;
        let d = projected_gradient(&src.intrinsics, &c.q, du, dv);
        let g = Vector3::new(-d.x, -d.y, 1.0 - d.z);
        Some((c.q.z - c.source_depth, pose_jacobian(&c.q, &g)))
    }
}

impl ResidualTerm for DepthTerm {
    #[inline]
    fn linearize(
        &self,
        eval: &CorrespondenceEvaluator<'_>,
        c: &Correspondence,
        ne: &mut NormalEquations,
    ) -> bool {
        match self.row(eval, c) {
            Some((r, j)) => {
                ne.add_row(&j, r, self.weight, self.loss);
                true
            }
            None => false,
        }
    }
}

/// Both residuals stacked: two rows per correspondence when the depth
/// gradient exists, the photometric row alone otherwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HybridTerm {
    pub intensity: IntensityTerm,
    pub depth: DepthTerm,
}

impl HybridTerm {
    pub fn from_options(opts: &OdometryOptions) -> Self {
        Self {
            intensity: IntensityTerm::from_options(opts),
            depth: DepthTerm::from_options(opts),
        }
    }
}

impl ResidualTerm for HybridTerm {
    #[inline]
    fn linearize(
        &self,
        eval: &CorrespondenceEvaluator<'_>,
        c: &Correspondence,
        ne: &mut NormalEquations,
    ) -> bool {
        self.intensity.linearize(eval, c, ne);
        self.depth.linearize(eval, c, ne);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeIntrinsics;
    use crate::image::ImageF32;
    use crate::odometry::correspondence::DepthLimits;
    use crate::pyramid::{PyramidOptions, RgbdPyramid};
    use crate::rgbd::RgbdFrame;
    use crate::se3;
    use nalgebra::Isometry3;

    const LIMITS: DepthLimits = DepthLimits {
        min_depth: 0.1,
        max_depth: 4.0,
        max_depth_difference: 0.5,
    };

    /// Smooth texture on a slanted plane so both gradients are non-trivial.
    fn slanted_scene() -> RgbdPyramid {
        let (w, h) = (64, 48);
        let k = PinholeIntrinsics::new(w, h, 60.0, 60.0, 31.5, 23.5);
        let intensity = ImageF32::from_fn(w, h, |x, y| {
            let (x, y) = (x as f32, y as f32);
            0.5 + 0.25 * (0.21 * x).sin() * (0.17 * y).cos() + 0.1 * (0.05 * (x + y)).sin()
        });
        let depth = ImageF32::from_fn(w, h, |x, y| 1.8 + 0.01 * x as f32 + 0.004 * y as f32);
        let frame = RgbdFrame::new(intensity, depth).expect("frame");
        RgbdPyramid::build(&frame, &k, &PyramidOptions::new(1)).expect("pyramid")
    }

    #[test]
    fn jacobian_row_matches_cross_product_layout() {
        let q = Vector3::new(0.2, -0.1, 2.0);
        let g = Vector3::new(0.5, 0.25, -1.0);
        let j = pose_jacobian(&q, &g);
        let w = q.cross(&g);
        assert_eq!(j, Vector6::new(w.x, w.y, w.z, 0.5, 0.25, -1.0));
    }

    /// Compare analytic rows against central differences of the residual
    /// under `exp(δ)·T`.
    #[test]
    fn analytic_rows_match_numeric_derivatives() {
        let pyr = slanted_scene();
        let lvl = &pyr.levels[0];
        let pose = se3::exp(&Vector6::new(0.004, -0.003, 0.002, 0.01, -0.008, 0.005));
        let opts = OdometryOptions::default();
        let it = IntensityTerm::from_options(&opts);
        let dt = DepthTerm::from_options(&opts);
        let eps = 1e-6;

        let eval = CorrespondenceEvaluator::new(lvl, lvl, &pose, LIMITS);
        let (x, y) = (30, 22);
        let c = eval.evaluate(x, y).expect("valid correspondence");
        let (_, ji) = it.row(&eval, &c);
        let (_, jd) = dt.row(&eval, &c).expect("depth gradient");

        for k in 0..6 {
            let mut delta = Vector6::zeros();
            delta[k] = eps;
            let plus: Isometry3<f64> = se3::exp(&delta) * pose;
            let minus: Isometry3<f64> = se3::exp(&(-delta)) * pose;
            let ep = CorrespondenceEvaluator::new(lvl, lvl, &plus, LIMITS);
            let em = CorrespondenceEvaluator::new(lvl, lvl, &minus, LIMITS);
            let cp = ep.evaluate(x, y).expect("plus");
            let cm = em.evaluate(x, y).expect("minus");
            let ni = (it.row(&ep, &cp).0 - it.row(&em, &cm).0) / (2.0 * eps);
            let nd = (dt.row(&ep, &cp).expect("plus").0 - dt.row(&em, &cm).expect("minus").0)
                / (2.0 * eps);
            // the sampled gradients are discrete approximations of the
            // bilinear surface, so agreement is only approximate
            assert!(
                (ni - ji[k]).abs() < 0.15 * ji.norm() + 1e-4,
                "intensity d/dxi[{k}]: numeric {ni} vs analytic {}",
                ji[k]
            );
            assert!(
                (nd - jd[k]).abs() < 0.02 * jd.norm() + 1e-6,
                "depth d/dxi[{k}]: numeric {nd} vs analytic {}",
                jd[k]
            );
        }
    }

    #[test]
    fn hybrid_adds_both_rows_and_counts_missing_depth_gradient() {
        let pyr = slanted_scene();
        let lvl = &pyr.levels[0];
        let eval = CorrespondenceEvaluator::new(lvl, lvl, &Isometry3::identity(), LIMITS);
        let c = eval.evaluate(10, 10).expect("valid");
        let opts = OdometryOptions::default();

        let mut only_i = NormalEquations::default();
        IntensityTerm::from_options(&opts).linearize(&eval, &c, &mut only_i);
        let mut only_d = NormalEquations::default();
        assert!(DepthTerm::from_options(&opts).linearize(&eval, &c, &mut only_d));
        let mut both = NormalEquations::default();
        assert!(HybridTerm::from_options(&opts).linearize(&eval, &c, &mut both));

        let mut summed = only_i.clone();
        summed.merge(&only_d);
        assert!((both.hessian - summed.hessian).norm() < 1e-12);
        assert!((both.gradient - summed.gradient).norm() < 1e-12);
    }
}
