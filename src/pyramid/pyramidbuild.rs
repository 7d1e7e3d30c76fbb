use super::filters::{StaticSeparableFilter, BINOMIAL_3TAP};
use super::options::PyramidOptions;
use crate::camera::PinholeIntrinsics;
use crate::error::{OdometryError, Result};
use crate::gradient::{depth_gradients, sobel_gradients, Grad};
use crate::image::ImageF32;
use crate::rgbd::{depth_in_range, is_valid_depth, RgbdFrame, INVALID_DEPTH};

use std::time::Instant;

/// Smallest width/height a level may have and still support bilinear lookups
/// with a one-pixel gradient border.
const MIN_LEVEL_SIZE: usize = 4;

/// One resolution stage: images, derivatives and matching intrinsics.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub index: usize,
    pub intrinsics: PinholeIntrinsics,
    pub intensity: ImageF32,
    pub depth: ImageF32,
    pub intensity_grad: Grad,
    pub depth_grad: Grad,
}

impl PyramidLevel {
    fn new(
        index: usize,
        intrinsics: PinholeIntrinsics,
        intensity: ImageF32,
        depth: ImageF32,
        gradient_scale: f32,
    ) -> Self {
        let intensity_grad = sobel_gradients(&intensity, gradient_scale);
        let depth_grad = depth_gradients(&depth, gradient_scale);
        Self {
            index,
            intrinsics,
            intensity,
            depth,
            intensity_grad,
            depth_grad,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.intensity.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.intensity.h
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.intensity.len()
    }
}

/// RGB-D pyramid ordered finest (index 0) to coarsest.
#[derive(Clone, Debug, Default)]
pub struct RgbdPyramid {
    pub levels: Vec<PyramidLevel>,
}

impl RgbdPyramid {
    /// Build a pyramid from a frame and its full-resolution intrinsics.
    ///
    /// Depth outside `[min_depth, max_depth]` is masked first. Each further
    /// level blurs and decimates intensity, decimates depth without
    /// synthesizing samples where the finer level had none, and halves the
    /// intrinsics.
    pub fn build(
        frame: &RgbdFrame,
        intrinsics: &PinholeIntrinsics,
        options: &PyramidOptions,
    ) -> Result<Self> {
        frame.validate()?;
        intrinsics.validate()?;
        if frame.width() != intrinsics.width || frame.height() != intrinsics.height {
            return Err(OdometryError::DimensionMismatch(format!(
                "frame is {}x{} but intrinsics describe {}x{}",
                frame.width(),
                frame.height(),
                intrinsics.width,
                intrinsics.height
            )));
        }
        if options.levels == 0 {
            return Err(OdometryError::InvalidOptions(
                "pyramid requires at least one level".to_string(),
            ));
        }
        let coarsest = intrinsics.scaled(options.levels - 1);
        if coarsest.width < MIN_LEVEL_SIZE || coarsest.height < MIN_LEVEL_SIZE {
            return Err(OdometryError::InvalidOptions(format!(
                "{} levels shrink {}x{} to {}x{}, below the {MIN_LEVEL_SIZE}px minimum",
                options.levels, intrinsics.width, intrinsics.height, coarsest.width, coarsest.height
            )));
        }

        let mut levels = Vec::with_capacity(options.levels);
        let depth0 = frame.masked_depth(options.min_depth, options.max_depth);
        levels.push(PyramidLevel::new(
            0,
            *intrinsics,
            frame.intensity.clone(),
            depth0,
            options.gradient_scale,
        ));

        let blur_limit = options.blur_levels.min(options.levels.saturating_sub(1));
        let mut horiz_cache = Vec::new();
        let mut cached_rows = Vec::new();
        for lvl in 1..options.levels {
            let prev = &levels[lvl - 1];
            let (nw, nh) = (prev.width().div_ceil(2), prev.height().div_ceil(2));
            let mut intensity = ImageF32::new(nw, nh);
            if lvl <= blur_limit {
                downsample_with_filter(
                    &prev.intensity,
                    &mut intensity,
                    options.filter,
                    &mut horiz_cache,
                    &mut cached_rows,
                );
            } else {
                downsample_without_filter(&prev.intensity, &mut intensity);
            }
            let depth = downsample_depth(&prev.depth, options.depth_discontinuity);
            levels.push(PyramidLevel::new(
                lvl,
                intrinsics.scaled(lvl),
                intensity,
                depth,
                options.gradient_scale,
            ));
        }

        Ok(Self { levels })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level `index` (0 = finest).
    #[inline]
    pub fn level(&self, index: usize) -> Option<&PyramidLevel> {
        self.levels.get(index)
    }
}

/// Pyramid build output together with its wall-clock cost.
#[derive(Clone, Debug)]
pub struct PyramidResult {
    pub pyramid: RgbdPyramid,
    pub elapsed_ms: f64,
}

pub fn build_pyramid(
    frame: &RgbdFrame,
    intrinsics: &PinholeIntrinsics,
    options: &PyramidOptions,
) -> Result<PyramidResult> {
    let start = Instant::now();
    let pyramid = RgbdPyramid::build(frame, intrinsics, options)?;
    Ok(PyramidResult {
        pyramid,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    })
}

fn downsample_without_filter(src: &ImageF32, dst: &mut ImageF32) {
    if src.w == 0 || src.h == 0 {
        return;
    }
    let max_sx = src.w.saturating_sub(1);
    let max_sy = src.h.saturating_sub(1);
    let mut sy = 0usize;
    for y in 0..dst.h {
        let src_row = src.row(sy.min(max_sy));
        let dst_row = dst.row_mut(y);
        let mut sx = 0usize;
        for dst_px in dst_row {
            *dst_px = src_row[sx.min(max_sx)];
            sx = sx.saturating_add(2);
        }
        sy = sy.saturating_add(2);
    }
}

/// Blur-and-decimate centred on the even source pixels, so that level pixel
/// `x` sits exactly at source pixel `2x` and the principal point halves.
fn downsample_with_filter(
    src: &ImageF32,
    dst: &mut ImageF32,
    filter: StaticSeparableFilter,
    horiz_cache: &mut Vec<f32>,
    cached_rows: &mut Vec<isize>,
) {
    if src.w == 0 || src.h == 0 || dst.w == 0 || dst.h == 0 {
        return;
    }
    let taps = filter.taps();
    if taps.is_empty() {
        downsample_without_filter(src, dst);
        return;
    }
    let radius = filter.radius();
    let taps_len = taps.len();
    let cache_width = dst.w;

    horiz_cache.resize(cache_width * taps_len, 0.0);
    cached_rows.clear();
    cached_rows.resize(taps_len, -1);

    for y in 0..dst.h {
        let center_sy = (y * 2) as isize;
        for ky in 0..taps_len {
            let offset = ky as isize - radius as isize;
            let sy = clamp_index(center_sy + offset, src.h) as isize;
            if cached_rows[ky] != sy {
                let src_row = src.row(sy as usize);
                let cache_row = &mut horiz_cache[ky * cache_width..(ky + 1) * cache_width];
                filter_row_downsample(src_row, cache_row, taps, radius);
                cached_rows[ky] = sy;
            }
        }
        let dst_row = dst.row_mut(y);
        for (x, dst_px) in dst_row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (ky, &tap) in taps.iter().enumerate() {
                acc += tap * horiz_cache[ky * cache_width + x];
            }
            *dst_px = acc;
        }
    }
}

fn filter_row_downsample(row: &[f32], out: &mut [f32], taps: &[f32], radius: usize) {
    if row.is_empty() || out.is_empty() {
        return;
    }
    let max_x = row.len();
    let mut sx = 0isize;
    for dst_px in out {
        let mut acc = 0.0f32;
        for (k, &tap) in taps.iter().enumerate() {
            let offset = k as isize - radius as isize;
            let idx = clamp_index(sx + offset, max_x);
            acc += tap * row[idx];
        }
        *dst_px = acc;
        sx = sx.saturating_add(2);
    }
}

/// Decimate depth keeping source pixel `(2x, 2y)` as the anchor.
///
/// The output is invalid whenever the anchor is invalid. Otherwise it is the
/// binomial-weighted mean of the valid 3×3 neighbours whose depth stays
/// within `max_jump` of the anchor, so missing depth is never filled in and
/// foreground/background are not blended across occlusion edges.
fn downsample_depth(src: &ImageF32, max_jump: f32) -> ImageF32 {
    let (nw, nh) = (src.w.div_ceil(2), src.h.div_ceil(2));
    let mut dst = ImageF32::filled(nw, nh, INVALID_DEPTH);
    if src.w == 0 || src.h == 0 {
        return dst;
    }
    let taps = BINOMIAL_3TAP.taps();
    for y in 0..nh {
        let cy = (y * 2).min(src.h - 1);
        let dst_row = dst.row_mut(y);
        for (x, dst_px) in dst_row.iter_mut().enumerate() {
            let cx = (x * 2).min(src.w - 1);
            let anchor = src.get(cx, cy);
            if !is_valid_depth(anchor) {
                continue;
            }
            let mut acc = 0.0f32;
            let mut weight = 0.0f32;
            for (ky, &wy) in taps.iter().enumerate() {
                let sy = clamp_index(cy as isize + ky as isize - 1, src.h);
                let row = src.row(sy);
                for (kx, &wx) in taps.iter().enumerate() {
                    let sx = clamp_index(cx as isize + kx as isize - 1, src.w);
                    let d = row[sx];
                    if is_valid_depth(d) && (d - anchor).abs() <= max_jump {
                        acc += wx * wy * d;
                        weight += wx * wy;
                    }
                }
            }
            *dst_px = if weight > 0.0 { acc / weight } else { anchor };
        }
    }
    dst
}

fn clamp_index(idx: isize, upper: usize) -> usize {
    if upper == 0 {
        return 0;
    }
    if idx < 0 {
        0
    } else if (idx as usize) >= upper {
        upper - 1
    } else {
        idx as usize
    }
}

/// Fraction of pixels of `level` whose depth lies in `[min_depth, max_depth]`.
pub fn valid_depth_fraction(level: &PyramidLevel, min_depth: f32, max_depth: f32) -> f32 {
    let total = level.pixel_count().max(1);
    let valid = level
        .depth
        .count_where(|d| depth_in_range(d, min_depth, max_depth));
    valid as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: usize, h: usize, depth: impl Fn(usize, usize) -> f32) -> RgbdFrame {
        let intensity = ImageF32::from_fn(w, h, |x, y| ((x + 2 * y) % 7) as f32 / 7.0);
        let depth = ImageF32::from_fn(w, h, depth);
        RgbdFrame::new(intensity, depth).expect("consistent frame")
    }

    #[test]
    fn levels_halve_images_and_intrinsics() {
        let f = frame(33, 20, |_, _| 2.0);
        let k = PinholeIntrinsics::new(33, 20, 40.0, 40.0, 16.0, 9.5);
        let pyr = RgbdPyramid::build(&f, &k, &PyramidOptions::new(3)).expect("pyramid");
        assert_eq!(pyr.len(), 3);
        let dims: Vec<_> = pyr.levels.iter().map(|l| (l.width(), l.height())).collect();
        assert_eq!(dims, vec![(33, 20), (17, 10), (9, 5)]);
        let coarse = pyr.level(2).expect("level 2");
        assert_eq!((coarse.intrinsics.width, coarse.intrinsics.height), (9, 5));
        assert!((coarse.intrinsics.fx - 10.0).abs() < 1e-12);
        assert!((coarse.intrinsics.cx - 4.0).abs() < 1e-12);
        assert_eq!(coarse.depth.get(4, 2), 2.0);
    }

    #[test]
    fn unblurred_levels_keep_every_other_pixel() {
        let f = frame(16, 12, |_, _| 1.5);
        let k = PinholeIntrinsics::new(16, 12, 20.0, 20.0, 7.5, 5.5);
        let opts = PyramidOptions::new(2).with_blur_levels(0);
        let pyr = RgbdPyramid::build(&f, &k, &opts).expect("pyramid");
        let fine = &pyr.levels[0].intensity;
        let coarse = &pyr.levels[1].intensity;
        for y in 0..coarse.h {
            for x in 0..coarse.w {
                assert_eq!(coarse.get(x, y), fine.get(2 * x, 2 * y));
            }
        }
    }

    #[test]
    fn depth_downsampling_never_fills_holes() {
        let f = frame(8, 8, |x, y| if x < 4 && y < 4 { 0.0 } else { 1.0 });
        let k = PinholeIntrinsics::new(8, 8, 10.0, 10.0, 3.5, 3.5);
        let pyr = RgbdPyramid::build(&f, &k, &PyramidOptions::new(2)).expect("pyramid");
        let d = &pyr.levels[1].depth;
        assert_eq!(d.get(0, 0), INVALID_DEPTH);
        assert_eq!(d.get(1, 1), INVALID_DEPTH);
        assert_eq!(d.get(2, 2), 1.0);
        // anchor (4, 4) is valid; its invalid neighbours are simply skipped
        assert_eq!(d.get(2, 0), 1.0);
    }

    #[test]
    fn depth_outside_range_is_masked_before_decimation() {
        let f = frame(8, 8, |x, _| if x % 2 == 0 { 9.0 } else { 1.0 });
        let k = PinholeIntrinsics::new(8, 8, 10.0, 10.0, 3.5, 3.5);
        let opts = PyramidOptions::new(2).with_depth_range(0.1, 4.0);
        let pyr = RgbdPyramid::build(&f, &k, &opts).expect("pyramid");
        assert_eq!(pyr.levels[0].depth.get(0, 0), INVALID_DEPTH);
        assert_eq!(pyr.levels[0].depth.get(1, 0), 1.0);
        assert_eq!(pyr.levels[1].depth.count_where(is_valid_depth), 0);
        assert_eq!(valid_depth_fraction(&pyr.levels[0], 0.1, 4.0), 0.5);
    }

    #[test]
    fn depth_average_respects_discontinuities() {
        let f = frame(8, 8, |x, _| if x < 3 { 1.0 } else { 3.0 });
        let k = PinholeIntrinsics::new(8, 8, 10.0, 10.0, 3.5, 3.5);
        let pyr = RgbdPyramid::build(&f, &k, &PyramidOptions::new(2)).expect("pyramid");
        // anchor (2, 2) sits on the near side next to the far wall
        assert_eq!(pyr.levels[1].depth.get(1, 1), 1.0);
        assert_eq!(pyr.levels[1].depth.get(2, 1), 3.0);
    }

    #[test]
    fn too_many_levels_for_image_is_rejected() {
        let f = frame(16, 16, |_, _| 1.0);
        let k = PinholeIntrinsics::new(16, 16, 10.0, 10.0, 7.5, 7.5);
        let err = RgbdPyramid::build(&f, &k, &PyramidOptions::new(4)).unwrap_err();
        assert!(matches!(err, OdometryError::InvalidOptions(_)));
        let wrong = PinholeIntrinsics::new(15, 16, 10.0, 10.0, 7.5, 7.5);
        let err = RgbdPyramid::build(&f, &wrong, &PyramidOptions::new(1)).unwrap_err();
        assert!(matches!(err, OdometryError::DimensionMismatch(_)));
    }
}
