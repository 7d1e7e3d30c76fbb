//! Robust losses for the iteratively re-weighted normal equations.
//!
//! Each loss provides the cost `ρ(r)` (scaled so that `ρ(r) ≈ r²` near zero)
//! and the IRLS weight `w(r) = ρ'(r) / 2r`, so a correspondence contributes
//! `w·JᵀJ` to the Hessian approximation and `ρ(r)` to the reported cost.
//!
//! | Loss | Weight | Behaviour |
//! |------|--------|-----------|
//! | None | 1 | plain least squares |
//! | Huber | 1 if \|r\| ≤ δ, else δ/\|r\| | linear tails |
//! | Tukey | (1 − (r/c)²)² if \|r\| ≤ c, else 0 | ignores gross outliers |

use serde::{Deserialize, Serialize};

/// Robust loss with its threshold expressed in residual units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RobustLoss {
    None,
    Huber { delta: f64 },
    Tukey { c: f64 },
}

impl RobustLoss {
    /// IRLS weight for residual `r`.
    #[inline]
    pub fn weight(&self, r: f64) -> f64 {
        match *self {
            RobustLoss::None => 1.0,
            RobustLoss::Huber { delta } => {
                let abs = r.abs();
                if abs <= delta {
                    1.0
                } else {
                    delta / abs
                }
            }
            RobustLoss::Tukey { c } => {
                let s = r / c;
                let s2 = s * s;
                if s2 <= 1.0 {
                    let t = 1.0 - s2;
                    t * t
                } else {
                    0.0
                }
            }
        }
    }

    /// Cost contribution `ρ(r)`.
    #[inline]
    pub fn rho(&self, r: f64) -> f64 {
        match *self {
            RobustLoss::None => r * r,
            RobustLoss::Huber { delta } => {
                let abs = r.abs();
                if abs <= delta {
                    r * r
                } else {
                    delta * (2.0 * abs - delta)
                }
            }
            RobustLoss::Tukey { c } => {
                let c2_3 = c * c / 3.0;
                let s = r / c;
                let s2 = s * s;
                if s2 <= 1.0 {
                    let t = 1.0 - s2;
                    c2_3 * (1.0 - t * t * t)
                } else {
                    c2_3
                }
            }
        }
    }
}

/// Robust loss family shared by both residual channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustKind {
    None,
    Huber,
    Tukey,
}

/// Robust weighting configuration; thresholds apply to the raw (unweighted)
/// residual of each channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustOptions {
    pub kind: RobustKind,
    /// Threshold for photometric residuals (intensity units, `[0, 1]` scale).
    pub intensity_threshold: f64,
    /// Threshold for geometric residuals (metres).
    pub depth_threshold: f64,
}

impl Default for RobustOptions {
    fn default() -> Self {
        Self {
            kind: RobustKind::Huber,
            intensity_threshold: 0.1,
            depth_threshold: 0.02,
        }
    }
}

impl RobustOptions {
    pub fn none() -> Self {
        Self {
            kind: RobustKind::None,
            ..Self::default()
        }
    }

    fn loss(&self, threshold: f64) -> RobustLoss {
        match self.kind {
            RobustKind::None => RobustLoss::None,
            RobustKind::Huber => RobustLoss::Huber { delta: threshold },
            RobustKind::Tukey => RobustLoss::Tukey { c: threshold },
        }
    }

    pub fn intensity_loss(&self) -> RobustLoss {
        self.loss(self.intensity_threshold)
    }

    pub fn depth_loss(&self) -> RobustLoss {
        self.loss(self.depth_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn huber_is_quadratic_inside_and_linear_outside() {
        let h = RobustLoss::Huber { delta: 0.1 };
        assert_relative_eq!(h.weight(0.05), 1.0);
        assert_relative_eq!(h.rho(0.05), 0.0025);
        assert_relative_eq!(h.weight(-0.4), 0.25);
        assert_relative_eq!(h.rho(0.4), 0.07);
        // continuous at the threshold
        assert_relative_eq!(h.rho(0.1), 0.01, epsilon = 1e-15);
    }

    #[test]
    fn tukey_rejects_gross_outliers() {
        let t = RobustLoss::Tukey { c: 0.2 };
        assert_relative_eq!(t.weight(0.0), 1.0);
        assert_eq!(t.weight(0.3), 0.0);
        assert_relative_eq!(t.rho(0.3), 0.04 / 3.0);
        assert!(t.rho(1e-3) > 0.0 && (t.rho(1e-3) - 1e-6).abs() < 1e-10);
    }

    #[test]
    fn weight_matches_derivative_of_rho() {
        let losses = [
            RobustLoss::None,
            RobustLoss::Huber { delta: 0.1 },
            RobustLoss::Tukey { c: 0.3 },
        ];
        let eps = 1e-7;
        for loss in losses {
            for &r in &[0.01, 0.07, 0.15, -0.2, 0.25] {
                let d_rho = (loss.rho(r + eps) - loss.rho(r - eps)) / (2.0 * eps);
                assert_relative_eq!(loss.weight(r), d_rho / (2.0 * r), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn options_map_thresholds_per_channel() {
        let opts = RobustOptions::default();
        assert_eq!(opts.intensity_loss(), RobustLoss::Huber { delta: 0.1 });
        assert_eq!(opts.depth_loss(), RobustLoss::Huber { delta: 0.02 });
        assert_eq!(RobustOptions::none().depth_loss(), RobustLoss::None);
    }
}
