//! I/O helpers for RGB-D images and JSON.
//!
//! - `load_intensity_image`: read a PNG/JPEG/etc., convert to luma, scale to `[0, 1]`.
//! - `load_depth_image`: read a 16-bit depth PNG into metres.
//! - `load_rgbd_frame`: colour + depth pair into an [`RgbdFrame`].
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::ImageF32;
use crate::rgbd::{depth_from_raw, RgbdFrame};
use image::{GrayImage, ImageBuffer, Luma};
use serde::Serialize;
use std::fs;
use std::path::Path;

fn open_luma8(path: &Path) -> Result<GrayImage, String> {
    Ok(image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma8())
}

fn open_luma16(path: &Path) -> Result<ImageBuffer<Luma<u16>, Vec<u16>>, String> {
    Ok(image::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?
        .into_luma16())
}

/// Load an image from disk as intensity in `[0, 1]`.
pub fn load_intensity_image(path: &Path) -> Result<ImageF32, String> {
    let img = open_luma8(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let data = img.into_raw().into_iter().map(|g| g as f32 / 255.0).collect();
    ImageF32::from_vec(w, h, data).ok_or_else(|| format!("Corrupt image buffer in {}", path.display()))
}

/// Load a 16-bit depth image, divide by `depth_scale` and drop samples beyond
/// `depth_trunc` metres.
pub fn load_depth_image(path: &Path, depth_scale: f32, depth_trunc: f32) -> Result<ImageF32, String> {
    let img = open_luma16(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    depth_from_raw(w, h, img.as_raw(), depth_scale, depth_trunc)
        .map_err(|e| format!("Invalid depth image {}: {e}", path.display()))
}

/// Load a colour (or grayscale) image and its registered 16-bit depth image.
pub fn load_rgbd_frame(
    color_path: &Path,
    depth_path: &Path,
    depth_scale: f32,
    depth_trunc: f32,
) -> Result<RgbdFrame, String> {
    let color = open_luma8(color_path)?;
    let depth = open_luma16(depth_path)?;
    if color.dimensions() != depth.dimensions() {
        return Err(format!(
            "{} is {:?} but {} is {:?}",
            color_path.display(),
            color.dimensions(),
            depth_path.display(),
            depth.dimensions()
        ));
    }
    let (w, h) = (color.width() as usize, color.height() as usize);
    RgbdFrame::from_raw(
        w,
        h,
        color.as_raw(),
        depth.as_raw(),
        depth_scale,
        depth_trunc,
    )
    .map_err(|e| format!("Invalid RGB-D pair {}: {e}", color_path.display()))
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize JSON for {}: {e}", path.display()))?;
    fs::write(path, json).map_err(|e| format!("Failed to write JSON {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}
