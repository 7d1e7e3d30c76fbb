use crate::camera::PinholeIntrinsics;
use crate::odometry::OdometryOptions;
use nalgebra::Matrix4;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration of the `rgbd_odometry` tool.
#[derive(Debug, Deserialize)]
pub struct OdometryToolConfig {
    pub source: FramePaths,
    pub target: FramePaths,
    #[serde(default)]
    pub intrinsics: PinholeIntrinsics,
    #[serde(default)]
    pub depth: DepthConfig,
    /// Row-major 4×4 initial guess; identity when absent.
    #[serde(default)]
    pub initial_pose: Option<[[f64; 4]; 4]>,
    #[serde(default)]
    pub odometry: OdometryOptions,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Colour (or grayscale) image and registered 16-bit depth image of a frame.
#[derive(Debug, Deserialize)]
pub struct FramePaths {
    pub color: PathBuf,
    pub depth: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Raw depth units per metre (1000 for millimetres, 5000 for TUM).
    pub scale: f32,
    /// Depth beyond this many metres is dropped while loading.
    pub trunc: f32,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            scale: 1000.0,
            trunc: 3.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where to write the JSON report; nothing is written when absent.
    pub report_json: Option<PathBuf>,
}

impl OdometryToolConfig {
    pub fn initial_matrix(&self) -> Matrix4<f64> {
        match &self.initial_pose {
            Some(rows) => Matrix4::from_fn(|r, c| rows[r][c]),
            None => Matrix4::identity(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<OdometryToolConfig, String> {
    let data = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}
