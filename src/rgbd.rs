//! Aligned intensity + depth frame.
//!
//! Intensity is stored in `[0, 1]`, depth in metres. A depth sample is valid
//! when it is finite and strictly positive; `0.0` is the canonical "missing"
//! sentinel written by every routine in this crate.

use crate::error::{OdometryError, Result};
use crate::image::ImageF32;

/// Sentinel written for missing or rejected depth.
pub const INVALID_DEPTH: f32 = 0.0;

#[inline]
pub fn is_valid_depth(d: f32) -> bool {
    d.is_finite() && d > 0.0
}

/// Depth inside the inclusive `[min_depth, max_depth]` range.
#[inline]
pub fn depth_in_range(d: f32, min_depth: f32, max_depth: f32) -> bool {
    is_valid_depth(d) && d >= min_depth && d <= max_depth
}

/// Convert 16-bit sensor depth to metres: divide by `depth_scale` and mark
/// zero readings and samples beyond `depth_trunc` as missing.
pub fn depth_from_raw(
    width: usize,
    height: usize,
    depth_raw: &[u16],
    depth_scale: f32,
    depth_trunc: f32,
) -> Result<ImageF32> {
    if depth_raw.len() != width * height {
        return Err(OdometryError::DimensionMismatch(format!(
            "expected {} depth samples for {width}x{height}, got {}",
            width * height,
            depth_raw.len()
        )));
    }
    if !(depth_scale.is_finite() && depth_scale > 0.0) {
        return Err(OdometryError::MissingDepth(format!(
            "depth scale must be positive, got {depth_scale}"
        )));
    }
    let data = depth_raw
        .iter()
        .map(|&raw| {
            let d = raw as f32 / depth_scale;
            if is_valid_depth(d) && d <= depth_trunc {
                d
            } else {
                INVALID_DEPTH
            }
        })
        .collect();
    Ok(ImageF32 {
        w: width,
        h: height,
        stride: width,
        data,
    })
}

/// Intensity and depth of one RGB-D observation, pixel-aligned.
#[derive(Clone, Debug)]
pub struct RgbdFrame {
    pub intensity: ImageF32,
    pub depth: ImageF32,
}

impl RgbdFrame {
    /// Pair an intensity and depth image, checking that their sizes agree.
    pub fn new(intensity: ImageF32, depth: ImageF32) -> Result<Self> {
        let frame = Self { intensity, depth };
        frame.validate()?;
        Ok(frame)
    }

    /// Build a frame from an 8-bit grayscale buffer and a 16-bit depth buffer
    /// (sensor units). Depth is divided by `depth_scale` (e.g. 1000 for
    /// millimetres, 5000 for TUM) and samples beyond `depth_trunc` metres are
    /// marked missing.
    pub fn from_raw(
        width: usize,
        height: usize,
        gray: &[u8],
        depth_raw: &[u16],
        depth_scale: f32,
        depth_trunc: f32,
    ) -> Result<Self> {
        if gray.len() != width * height || depth_raw.len() != width * height {
            return Err(OdometryError::DimensionMismatch(format!(
                "expected {} samples for {width}x{height}, got gray={} depth={}",
                width * height,
                gray.len(),
                depth_raw.len()
            )));
        }
        let intensity = ImageF32 {
            w: width,
            h: height,
            stride: width,
            data: gray.iter().map(|&g| g as f32 / 255.0).collect(),
        };
        let depth = depth_from_raw(width, height, depth_raw, depth_scale, depth_trunc)?;
        Self::new(intensity, depth)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.intensity.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.intensity.h
    }

    /// Check that both channels are present, share one resolution and are
    /// stored densely (`stride == w`).
    pub fn validate(&self) -> Result<()> {
        if self.intensity.is_empty() {
            return Err(OdometryError::DimensionMismatch(
                "intensity channel is empty".to_string(),
            ));
        }
        if self.depth.is_empty() {
            return Err(OdometryError::MissingDepth(
                "depth channel is empty".to_string(),
            ));
        }
        if !self.intensity.same_size(&self.depth) {
            return Err(OdometryError::DimensionMismatch(format!(
                "intensity {}x{} vs depth {}x{}",
                self.intensity.w, self.intensity.h, self.depth.w, self.depth.h
            )));
        }
        for (name, channel) in [("intensity", &self.intensity), ("depth", &self.depth)] {
            if channel.stride != channel.w {
                return Err(OdometryError::DimensionMismatch(format!(
                    "{name} stride {} differs from width {}",
                    channel.stride, channel.w
                )));
            }
            if channel.data.len() < channel.len() {
                return Err(OdometryError::DimensionMismatch(format!(
                    "{name} buffer holds {} samples, {}x{} needs {}",
                    channel.data.len(),
                    channel.w,
                    channel.h,
                    channel.len()
                )));
            }
        }
        Ok(())
    }

    /// Copy of the depth channel with samples outside `[min_depth, max_depth]`
    /// replaced by [`INVALID_DEPTH`].
    pub fn masked_depth(&self, min_depth: f32, max_depth: f32) -> ImageF32 {
        let mut out = self.depth.clone();
        for y in 0..out.h {
            for d in out.row_mut(y) {
                if !depth_in_range(*d, min_depth, max_depth) {
                    *d = INVALID_DEPTH;
                }
            }
        }
        out
    }

    /// Number of valid depth samples.
    pub fn valid_depth_count(&self) -> usize {
        self.depth.count_where(is_valid_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_scales_and_truncates_depth() {
        let gray = [0u8, 255, 51, 102];
        let depth = [1000u16, 0, 2500, 5000];
        let frame = RgbdFrame::from_raw(2, 2, &gray, &depth, 1000.0, 3.0).expect("valid frame");
        assert_eq!(frame.depth.data, vec![1.0, 0.0, 2.5, 0.0]);
        assert!((frame.intensity.get(1, 0) - 1.0).abs() < 1e-6);
        assert_eq!(frame.valid_depth_count(), 2);
    }

    #[test]
    fn mismatched_channels_are_rejected() {
        let err = RgbdFrame::new(ImageF32::new(4, 3), ImageF32::new(3, 4)).unwrap_err();
        assert!(matches!(err, OdometryError::DimensionMismatch(_)));
        let err = RgbdFrame::new(ImageF32::new(4, 3), ImageF32::new(0, 0)).unwrap_err();
        assert!(matches!(err, OdometryError::MissingDepth(_)));
    }

    #[test]
    fn padded_or_short_channels_are_rejected() {
        let mut depth = ImageF32::filled(4, 3, 1.0);
        depth.stride = 5;
        let frame = RgbdFrame {
            intensity: ImageF32::new(4, 3),
            depth,
        };
        assert!(matches!(
            frame.validate(),
            Err(OdometryError::DimensionMismatch(_))
        ));

        let mut intensity = ImageF32::new(4, 3);
        intensity.data.truncate(10);
        let err = RgbdFrame::new(intensity, ImageF32::filled(4, 3, 1.0)).unwrap_err();
        assert!(matches!(err, OdometryError::DimensionMismatch(_)));
    }

    #[test]
    fn masking_drops_out_of_range_depth() {
        let depth = ImageF32::from_vec(4, 1, vec![0.2, 1.0, 4.5, f32::NAN]).expect("size");
        let frame = RgbdFrame::new(ImageF32::new(4, 1), depth).expect("valid");
        let masked = frame.masked_depth(0.5, 4.0);
        assert_eq!(masked.data, vec![0.0, 1.0, 0.0, 0.0]);
    }
}
