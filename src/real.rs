use ndarray::NdFloat;
use num_traits::cast;
use std::iter::Sum;

/// Floating point element type accepted by every algorithm in the crate.
///
/// Implemented for `f32` and `f64`. `BYTES` drives the lane count chosen by
/// the kernel dispatch layer (a 256-bit register holds 8 `f32` or 4 `f64`).
pub trait Real: NdFloat + Default + Sum + Send + Sync + 'static {
    /// Size of one element in bytes
    const BYTES: usize;

    #[inline]
    fn from_usize(value: usize) -> Self {
        cast(value).unwrap_or_else(Self::infinity)
    }

    /// Out-of-range values saturate to infinity.
    #[inline]
    fn from_f64(value: f64) -> Self {
        cast(value).unwrap_or_else(|| {
            if value < 0.0 {
                Self::neg_infinity()
            } else {
                Self::infinity()
            }
        })
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl Real for f32 {
    const BYTES: usize = 4;
}

impl Real for f64 {
    const BYTES: usize = 8;
}
