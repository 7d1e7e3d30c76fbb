//! Scaled Sobel derivatives of intensity and depth.
//!
//! - Convolves the 3×3 Sobel pair with border clamping (replicate).
//! - Multiplies the response by a caller-provided scale; `0.125` turns the
//!   Sobel sum into a per-pixel central-difference derivative.
//! - The depth variant refuses to difference across missing depth: if any of
//!   the nine taps is invalid the output is `NaN`, which the sampler treats as
//!   "no gradient available".
//!
//! Complexity: O(W·H) per pass; memory: two float buffers.
use crate::image::ImageF32;
use crate::rgbd::is_valid_depth;

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Per-pixel horizontal and vertical derivatives.
#[derive(Clone, Debug)]
pub struct Grad {
    /// Derivative along +x (columns)
    pub gx: ImageF32,
    /// Derivative along +y (rows)
    pub gy: ImageF32,
}

fn sobel_with_mask(l: &ImageF32, scale: f32, tap_ok: impl Fn(f32) -> bool) -> Grad {
    let w = l.w;
    let h = l.h;
    let mut gx = ImageF32::new(w, h);
    let mut gy = ImageF32::new(w, h);

    if w == 0 || h == 0 {
        return Grad { gx, gy };
    }

    for y in 0..h {
        let y_idx = [y.saturating_sub(1), y, (y + 1).min(h - 1)];
        let rows = [l.row(y_idx[0]), l.row(y_idx[1]), l.row(y_idx[2])];
        let out_gx = gx.row_mut(y);
        let out_gy = gy.row_mut(y);
        for x in 0..w {
            let x_idx = [x.saturating_sub(1), x, (x + 1).min(w - 1)];

            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            let mut ok = true;
            for (ky, yy_row) in rows.iter().enumerate() {
                let kx_row = &SOBEL_KERNEL_X[ky];
                let ky_row = &SOBEL_KERNEL_Y[ky];
                for (kx, &xi) in x_idx.iter().enumerate() {
                    let v = yy_row[xi];
                    ok &= tap_ok(v);
                    sum_x += v * kx_row[kx];
                    sum_y += v * ky_row[kx];
                }
            }

            if ok {
                out_gx[x] = sum_x * scale;
                out_gy[x] = sum_y * scale;
            } else {
                out_gx[x] = f32::NAN;
                out_gy[x] = f32::NAN;
            }
        }
    }

    Grad { gx, gy }
}

/// Scaled Sobel gradients of a dense channel such as intensity.
pub fn sobel_gradients(l: &ImageF32, scale: f32) -> Grad {
    sobel_with_mask(l, scale, |v| v.is_finite())
}

/// Scaled Sobel gradients of depth; `NaN` wherever a tap is missing.
pub fn depth_gradients(depth: &ImageF32, scale: f32) -> Grad {
    sobel_with_mask(depth, scale, is_valid_depth)
}
