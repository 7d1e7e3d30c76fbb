use nalgebra::{Matrix4, Matrix6};
use serde::Serialize;

/// Outcome of one odometry call.
///
/// `transform` maps points from the target camera frame into the source
/// camera frame. `information` (inverse covariance, rotation rows first) is
/// only meaningful when `success` is true; failures carry the identity
/// transform and a zero information matrix.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OdometryResult {
    pub success: bool,
    pub transform: Matrix4<f64>,
    pub information: Matrix6<f64>,
}

impl OdometryResult {
    pub fn failure() -> Self {
        Self {
            success: false,
            transform: Matrix4::identity(),
            information: Matrix6::zeros(),
        }
    }
}

impl Default for OdometryResult {
    fn default() -> Self {
        Self::failure()
    }
}
