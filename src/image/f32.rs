//! Owned single-channel f32 image in row-major layout (stride == width).
//!
//! Used for every numeric channel the odometry consumes: intensity in
//! `[0, 1]`, depth in metres and the per-level gradient images.
#[derive(Clone, Debug)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Number of f32 elements between consecutive rows; frames require `w`
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Construct a zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self::filled(w, h, 0.0)
    }

    /// Construct a buffer of size `w × h` with every pixel set to `value`.
    pub fn filled(w: usize, h: usize, value: f32) -> Self {
        Self {
            w,
            h,
            stride: w,
            data: vec![value; w * h],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` when the length does
    /// not match `w * h`.
    pub fn from_vec(w: usize, h: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == w * h).then_some(Self {
            w,
            h,
            stride: w,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut out = Self::new(w, h);
        for y in 0..h {
            let row = out.row_mut(y);
            for (x, px) in row.iter_mut().enumerate() {
                *px = f(x, y);
            }
        }
        out
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.w * self.h
    }

    #[inline]
    /// Convert (x, y) to a linear index into `data`.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }

    #[inline]
    /// Get the pixel value at (x, y).
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    /// Set the pixel value at (x, y).
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn same_size(&self, other: &ImageF32) -> bool {
        self.w == other.w && self.h == other.h
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        let end = start + self.w;
        &mut self.data[start..end]
    }

    /// Mean over finite samples accepted by `keep`; `0.0` when none qualify.
    pub fn mean_where(&self, keep: impl Fn(f32) -> bool) -> f32 {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for y in 0..self.h {
            for &v in self.row(y) {
                if v.is_finite() && keep(v) {
                    sum += v as f64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            (sum / count as f64) as f32
        }
    }

    /// Number of samples accepted by `keep`.
    pub fn count_where(&self, keep: impl Fn(f32) -> bool) -> usize {
        (0..self.h)
            .map(|y| self.row(y).iter().filter(|&&v| keep(v)).count())
            .sum()
    }
}
