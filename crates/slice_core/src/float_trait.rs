//! Pixel scalar abstraction.
//!
//! Every engine is generic over the pixel type so a caller can keep a volume
//! in `f32` for memory or in `f64` for precision without conversion.

use num_traits::{Float, FromPrimitive, NumAssign};
use rustfft::FftNum;
use std::fmt::Debug;
use std::iter::Sum;

/// Floating point types a [`Slice`](crate::Slice) can hold.
///
/// The FFT filters need `FftNum`; the restoration solver and the metrics
/// widen to f64 through `to_f64_c` and narrow back with `from_f64_c`.
pub trait SliceFloat:
    Float + FftNum + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static
{
    /// Narrow (or pass through) an f64 value.
    fn from_f64_c(val: f64) -> Self;

    /// Widen (or pass through) to f64.
    fn to_f64_c(self) -> f64;

    /// Pixel or tap count as a float, for averaging.
    fn usize_as(val: usize) -> Self;
}

macro_rules! impl_slice_float {
    ($($t:ty),*) => {$(
        impl SliceFloat for $t {
            #[inline]
            fn from_f64_c(val: f64) -> Self {
                val as $t
            }

            #[inline]
            fn to_f64_c(self) -> f64 {
                self as f64
            }

            #[inline]
            fn usize_as(val: usize) -> Self {
                val as $t
            }
        }
    )*};
}

impl_slice_float!(f32, f64);
