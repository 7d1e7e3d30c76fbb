/// Separable 1D kernel applied along rows then columns before decimation.
///
/// Taps are listed left-to-right and assumed to sum to one; the centre tap
/// sits at index `taps.len() / 2`.
#[derive(Clone, Copy, Debug)]
pub struct StaticSeparableFilter {
    taps: &'static [f32],
}

impl Default for StaticSeparableFilter {
    fn default() -> Self {
        GAUSSIAN_5TAP
    }
}

impl StaticSeparableFilter {
    pub const fn new(taps: &'static [f32]) -> Self {
        Self { taps }
    }

    #[inline]
    pub fn taps(&self) -> &[f32] {
        self.taps
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.taps.len() / 2
    }
}

/// Normalised 5-tap Gaussian filter `[1, 4, 6, 4, 1] / 16`.
pub const GAUSSIAN_5TAP: StaticSeparableFilter =
    StaticSeparableFilter::new(&[0.0625, 0.25, 0.375, 0.25, 0.0625]);

/// Normalised 3-tap binomial `[1, 2, 1] / 4`, used to weight depth taps.
pub const BINOMIAL_3TAP: StaticSeparableFilter = StaticSeparableFilter::new(&[0.25, 0.5, 0.25]);
