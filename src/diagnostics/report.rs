use crate::diagnostics::{PyramidStage, TimingBreakdown};
use crate::odometry::{InformationKind, LevelReport, ResidualFormulation};
use crate::types::OdometryResult;
use serde::Serialize;

/// Result returned by
/// [`compute_rgbd_odometry_with_diagnostics`](crate::compute_rgbd_odometry_with_diagnostics).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OdometryReport {
    pub result: OdometryResult,
    pub trace: OdometryTrace,
}

/// Execution trace of one odometry call.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OdometryTrace {
    pub input: InputDescriptor,
    pub timings: TimingBreakdown,
    /// Present when the pyramids were built by the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_pyramid: Option<PyramidStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_pyramid: Option<PyramidStage>,
    /// Level reports in execution order (coarsest first).
    pub levels: Vec<LevelReport>,
    /// Valid correspondence fraction at the final pose, finest level.
    pub final_valid_fraction: f64,
    /// Mean cost at the final pose, finest level.
    pub final_cost: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
    pub pyramid_levels: usize,
    pub residual_formulation: ResidualFormulation,
    pub information: InformationKind,
}

impl OdometryReport {
    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        let outcomes: Vec<String> = self
            .trace
            .levels
            .iter()
            .map(|l| format!("L{}:{:?}/{}", l.level_index, l.outcome, l.iterations))
            .collect();
        format!(
            "success={} valid={:.3} cost={:.4e} levels=[{}] total_ms={:.2}",
            self.result.success,
            self.trace.final_valid_fraction,
            self.trace.final_cost,
            outcomes.join(" "),
            self.trace.timings.total_ms
        )
    }
}
