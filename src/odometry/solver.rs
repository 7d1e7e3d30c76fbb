//! 6×6 step solve for the normal equations.
//!
//! Solves `(H + μ·diag(H)) Δ = -b` by Cholesky. The system counts as singular
//! when the factorisation fails, when a pivot is negligible next to the
//! largest diagonal entry of `H`, or when the solution is not finite.

use super::accumulator::NormalEquations;
use crate::error::LevelFailure;
use nalgebra::{Cholesky, Matrix6, Vector6};

/// Smallest squared Cholesky pivot, relative to `max diag(H)`, that is still
/// considered well-posed.
const MIN_RELATIVE_PIVOT: f64 = 1e-12;

/// Solve for the update `Δ` with Marquardt damping `mu` (`0` = Gauss-Newton).
pub fn solve_step(ne: &NormalEquations, mu: f64) -> Result<Vector6<f64>, LevelFailure> {
    let mut h: Matrix6<f64> = ne.hessian;
    if mu > 0.0 {
        for i in 0..6 {
            h[(i, i)] *= 1.0 + mu;
        }
    }
    let max_diag = h.diagonal().max();
    if !(max_diag > 0.0) || !max_diag.is_finite() {
        return Err(LevelFailure::SingularSystem);
    }
    let chol = Cholesky::new(h).ok_or(LevelFailure::SingularSystem)?;
    let min_pivot = chol.l_dirty().diagonal().min();
    if min_pivot * min_pivot <= MIN_RELATIVE_PIVOT * max_diag {
        return Err(LevelFailure::SingularSystem);
    }
    let delta = chol.solve(&(-ne.gradient));
    if delta.iter().all(|v| v.is_finite()) {
        Ok(delta)
    } else {
        Err(LevelFailure::SingularSystem)
    }
}
