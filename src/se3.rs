//! SE(3) helpers for the incremental pose updates.
//!
//! Twists are ordered `ξ = (ω, v)`: rotation (axis-angle) first, translation
//! second. Updates compose on the left, `T ← exp(Δξ) · T`, so the solver's
//! Jacobians are taken with respect to a perturbation applied in the frame the
//! transform maps into.

use crate::error::{OdometryError, Result};
use nalgebra::{
    Isometry3, Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6,
};

const SMALL_ANGLE: f64 = 1e-8;
const RIGID_TOL: f64 = 1e-4;

/// Skew-symmetric matrix `[v]×` with `[v]× u = v × u`.
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

/// Left Jacobian of SO(3), `V(ω)`, mapping the translational twist part to the
/// translation of `exp(ξ)`.
fn left_jacobian(omega: &Vector3<f64>) -> Matrix3<f64> {
    let theta = omega.norm();
    let k = skew(omega);
    if theta < SMALL_ANGLE {
        return Matrix3::identity() + 0.5 * k;
    }
    let theta_sq = theta * theta;
    Matrix3::identity()
        + ((1.0 - theta.cos()) / theta_sq) * k
        + ((theta - theta.sin()) / (theta_sq * theta)) * k * k
}

/// Exponential map `se(3) → SE(3)`.
pub fn exp(xi: &Vector6<f64>) -> Isometry3<f64> {
    let omega = Vector3::new(xi[0], xi[1], xi[2]);
    let v = Vector3::new(xi[3], xi[4], xi[5]);
    let rotation = UnitQuaternion::from_scaled_axis(omega);
    let t = left_jacobian(&omega) * v;
    Isometry3::from_parts(Translation3::from(t), rotation)
}

/// Logarithm map `SE(3) → se(3)`, inverse of [`exp`] for rotations below π.
pub fn log(pose: &Isometry3<f64>) -> Vector6<f64> {
    let omega = pose.rotation.scaled_axis();
    let v = left_jacobian(&omega)
        .try_inverse()
        .map(|inv| inv * pose.translation.vector)
        .unwrap_or(pose.translation.vector);
    Vector6::new(omega.x, omega.y, omega.z, v.x, v.y, v.z)
}

/// Rotation angle (radians) and translation norm of a relative pose.
pub fn pose_error(a: &Isometry3<f64>, b: &Isometry3<f64>) -> (f64, f64) {
    let delta = a.inverse() * b;
    (delta.rotation.angle(), delta.translation.vector.norm())
}

/// Convert a homogeneous 4×4 matrix into a rigid transform.
///
/// Rejects matrices whose bottom row is not `[0 0 0 1]`, whose rotation block
/// is not orthonormal with determinant +1 (within a small tolerance), or that
/// contain non-finite entries. The rotation is re-orthonormalised.
pub fn isometry_from_matrix(m: &Matrix4<f64>) -> Result<Isometry3<f64>> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(OdometryError::InvalidPose(
            "matrix contains non-finite entries".to_string(),
        ));
    }
    let bottom = [m[(3, 0)], m[(3, 1)], m[(3, 2)], m[(3, 3)]];
    if bottom[0].abs() > RIGID_TOL
        || bottom[1].abs() > RIGID_TOL
        || bottom[2].abs() > RIGID_TOL
        || (bottom[3] - 1.0).abs() > RIGID_TOL
    {
        return Err(OdometryError::InvalidPose(format!(
            "bottom row must be [0 0 0 1], got {bottom:?}"
        )));
    }
    let r: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let orth_err = (r.transpose() * r - Matrix3::identity()).norm();
    if orth_err > RIGID_TOL * 10.0 || (r.determinant() - 1.0).abs() > RIGID_TOL * 10.0 {
        return Err(OdometryError::InvalidPose(format!(
            "rotation block is not a proper rotation (orthogonality error {orth_err:.2e})"
        )));
    }
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(&r));
    let t = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    Ok(Isometry3::from_parts(Translation3::from(t), rotation))
}
