//! Error types for the odometry entry points.
//!
//! Only malformed inputs are reported as errors. Numerical degeneracies
//! (too few correspondences, singular normal equations) are recovered inside
//! the solver and surface as `success == false` on the result instead.

/// Result type alias
pub type Result<T> = std::result::Result<T, OdometryError>;

/// Input validation failures detected before any optimisation starts.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum OdometryError {
    /// Intensity/depth channels or source/target frames disagree in size.
    #[error("frame dimensions do not match: {0}")]
    DimensionMismatch(String),

    /// A frame carries no depth channel, or no valid depth sample at all.
    #[error("missing depth: {0}")]
    MissingDepth(String),

    /// Focal lengths, principal point or resolution are unusable.
    #[error("invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    /// Option values are inconsistent or out of range.
    #[error("invalid odometry options: {0}")]
    InvalidOptions(String),

    /// The initial guess is not a rigid transform.
    #[error("invalid initial pose: {0}")]
    InvalidPose(String),
}

/// Why a pyramid level gave up. Recorded in the level report; never returned
/// as an `Err`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelFailure {
    /// Fewer valid correspondences than the configured fraction requires.
    #[error("insufficient correspondences: {valid} of {total} pixels")]
    InsufficientCorrespondence { valid: usize, total: usize },

    /// The normal equations could not be solved.
    #[error("normal equations are singular")]
    SingularSystem,
}
