//! Resolution Modifier: spatial resampling, radiometric quantization and
//! temporal motion blur.

use log::{debug, warn};
use ndarray::{s, Array1, Array2};

use crate::error::{EngineError, Result};
use crate::float_trait::SliceFloat;
use crate::slice::{min_max, Slice};
use crate::toeplitz::symmetric_toeplitz;

/// Quantization depths at or above this are returned unchanged.
pub const MAX_QUANTIZE_BITS: u32 = 16;

/// Number of one-sided motion taps before truncation to the axis length.
pub const MOTION_TAPS: usize = 300;

/// Spacing of the motion kernel sample points `n_i = MOTION_STEP·i`.
const MOTION_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Strided decimation.
    Sub,
    /// Bilinear upsampling.
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAxis {
    /// Blur along rows (`M · image`).
    Vertical,
    /// Blur along columns (`image · Mᵗ`).
    Horizontal,
    /// Both at once (`M_v · image · M_hᵗ`).
    Both,
}

/// One resolution change. Exactly one variant is active per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolutionSpec {
    SpatialResample { mode: SamplingMode, percentage: f64 },
    RadiometricQuantize { bits: u32 },
    TemporalBlur { axis: MotionAxis, intensity_percent: f64 },
}

impl ResolutionSpec {
    pub fn validate(&self) -> Result<()> {
        match *self {
            ResolutionSpec::SpatialResample { percentage, .. } => {
                if !(percentage.is_finite() && percentage >= 0.0) {
                    return Err(EngineError::invalid(
                        "percentage",
                        format!("must be finite and >= 0, got {percentage}"),
                    ));
                }
                Ok(())
            }
            ResolutionSpec::RadiometricQuantize { bits } => {
                if bits == 0 {
                    return Err(EngineError::invalid("bits", "bit depth must be >= 1"));
                }
                Ok(())
            }
            ResolutionSpec::TemporalBlur {
                intensity_percent, ..
            } => {
                if !intensity_percent.is_finite() {
                    return Err(EngineError::invalid(
                        "intensity_percent",
                        format!("must be finite, got {intensity_percent}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Apply `spec` to `slice`. The output keeps the input's volume range.
pub fn apply<F: SliceFloat>(slice: &Slice<F>, spec: &ResolutionSpec) -> Result<Slice<F>> {
    spec.validate()?;
    debug!("resolution {:?} on {:?} slice", spec, slice.dim());

    if slice.is_empty() {
        return Ok(slice.clone());
    }

    let data = match *spec {
        ResolutionSpec::SpatialResample {
            mode: SamplingMode::Sub,
            percentage,
        } => {
            let (h, w) = slice.dim();
            let stride = subsample_stride(percentage, h, w) as isize;
            slice.view().slice(s![..;stride, ..;stride]).to_owned()
        }
        ResolutionSpec::SpatialResample {
            mode: SamplingMode::Over,
            percentage,
        } => oversample(slice, 1.0 + percentage / 100.0),
        ResolutionSpec::RadiometricQuantize { bits } => quantize(slice, bits),
        ResolutionSpec::TemporalBlur {
            axis,
            intensity_percent,
        } => temporal_blur(slice, axis, intensity_percent / 100.0),
    };

    Ok(slice.with_data(data))
}

/// Decimation stride for a subsampling percentage:
/// `clamp(round(1 + 10·p/100), 1, min(h, w))`, halves rounding to even.
pub fn subsample_stride(percentage: f64, rows: usize, cols: usize) -> usize {
    let raw = (1.0 + percentage / 100.0 * 10.0).round_ties_even();
    let upper = rows.min(cols).max(1) as f64;
    raw.clamp(1.0, upper) as usize
}

/// Source coordinates of `n` samples spread evenly over `[0, len - 1]`.
fn linspace_coords(len: usize, n: usize) -> Vec<f64> {
    let last = (len - 1) as f64;
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n).map(|i| i as f64 * last / (n - 1) as f64).collect(),
    }
}

fn oversample<F: SliceFloat>(slice: &Slice<F>, scale: f64) -> Array2<F> {
    let (h, w) = slice.dim();
    let new_h = (h as f64 * scale).floor() as usize;
    let new_w = (w as f64 * scale).floor() as usize;
    let rows = linspace_coords(h, new_h);
    let cols = linspace_coords(w, new_w);
    let img = slice.data();

    Array2::from_shape_fn((new_h, new_w), |(i, j)| {
        let (y, x) = (rows[i], cols[j]);
        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(h - 1);
        let x1 = (x0 + 1).min(w - 1);
        let wy = F::from_f64_c(y - y0 as f64);
        let wx = F::from_f64_c(x - x0 as f64);

        let top = (F::one() - wx) * img[[y0, x0]] + wx * img[[y0, x1]];
        let bottom = (F::one() - wx) * img[[y1, x0]] + wx * img[[y1, x1]];
        (F::one() - wy) * top + wy * bottom
    })
}

fn quantize<F: SliceFloat>(slice: &Slice<F>, bits: u32) -> Array2<F> {
    if bits >= MAX_QUANTIZE_BITS {
        return slice.data().clone();
    }
    let (lo, hi) = min_max(slice.view());
    if hi == lo {
        warn!("quantize: flat image, returning input unchanged");
        return slice.data().clone();
    }

    let (lo, hi) = (lo.to_f64_c(), hi.to_f64_c());
    let span = hi - lo;
    let levels = ((1u64 << bits) - 1) as f64;
    slice.data().mapv(|v| {
        let norm = (v.to_f64_c() - lo) / span;
        let q = (norm * levels).round_ties_even() / levels;
        F::from_f64_c(q * span + lo)
    })
}

/// One-sided motion taps for an axis of `len` samples, summing to 1.
/// `strength <= 0` gives the identity tap `[1, 0, ...]`.
///
/// `t_i = exp(-n_i / strength²)` for the first `min(len, MOTION_TAPS)`
/// samples. Starting the grid at `n_0 = 0` rather than `MOTION_STEP` scales
/// every tap by the same factor, which the normalization removes; it also
/// keeps `t_0 = 1`, so tiny strengths converge to the identity instead of
/// underflowing to zero.
pub fn motion_taps(len: usize, strength: f64) -> Array1<f64> {
    let mut column = Array1::zeros(len);
    if len == 0 {
        return column;
    }
    if strength <= 0.0 {
        column[0] = 1.0;
        return column;
    }

    let inv = 1.0 / (strength * strength);
    let kept = len.min(MOTION_TAPS);
    column
        .slice_mut(s![..kept])
        .assign(&Array1::from_shape_fn(kept, |i| {
            (-(MOTION_STEP * i as f64) * inv).exp()
        }));
    let total = column.sum();
    column /= total;
    column
}

fn motion_matrix<F: SliceFloat>(len: usize, strength: f64) -> Array2<F> {
    let column = motion_taps(len, strength).mapv(F::from_f64_c);
    symmetric_toeplitz(column.view())
}

fn temporal_blur<F: SliceFloat>(slice: &Slice<F>, axis: MotionAxis, strength: f64) -> Array2<F> {
    if strength <= 0.0 {
        return slice.data().clone();
    }
    let (h, w) = slice.dim();
    let img = slice.data();

    // The Toeplitz operator is symmetric, so `image · Mᵗ == image · M`.
    match axis {
        MotionAxis::Vertical => motion_matrix::<F>(h, strength).dot(img),
        MotionAxis::Horizontal => img.dot(&motion_matrix::<F>(w, strength)),
        MotionAxis::Both => motion_matrix::<F>(h, strength)
            .dot(img)
            .dot(&motion_matrix::<F>(w, strength)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixture_slice, gradient, max_abs_diff, random_matrix};
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeSet;

    // ==================== Spatial Resampling Tests ====================

    #[test]
    fn test_subsample_stride_rounding() {
        assert_eq!(subsample_stride(0.0, 64, 64), 1);
        assert_eq!(subsample_stride(30.0, 64, 64), 4);
        // 3.5 and 2.5 round half to even.
        assert_eq!(subsample_stride(25.0, 64, 64), 4);
        assert_eq!(subsample_stride(15.0, 64, 64), 2);
        // Clamped to the shorter side.
        assert_eq!(subsample_stride(1000.0, 5, 8), 5);
    }

    #[test]
    fn test_subsample_dims_match_stride() {
        for &(h, w, p) in &[(20, 13, 30.0), (64, 64, 25.0), (7, 9, 10.0), (5, 8, 1000.0)] {
            let slice = fixture_slice(gradient(h, w));
            let factor = subsample_stride(p, h, w);
            let spec = ResolutionSpec::SpatialResample {
                mode: SamplingMode::Sub,
                percentage: p,
            };
            let out = apply(&slice, &spec).unwrap();
            assert_eq!(out.dim(), (h.div_ceil(factor), w.div_ceil(factor)));
            let (oh, ow) = out.dim();
            assert_eq!(
                out.data()[[oh - 1, ow - 1]],
                slice.data()[[(oh - 1) * factor, (ow - 1) * factor]]
            );
        }
    }

    #[test]
    fn test_oversample_zero_percent_is_identity() {
        let img = random_matrix(6, 5, 8);
        let slice = fixture_slice(img.clone());
        let spec = ResolutionSpec::SpatialResample {
            mode: SamplingMode::Over,
            percentage: 0.0,
        };
        assert_eq!(apply(&slice, &spec).unwrap().data(), &img);
    }

    #[test]
    fn test_oversample_reproduces_linear_ramp() {
        let ramp = Array2::from_shape_fn((4, 6), |(r, c)| 10.0 * r as f64 + c as f64);
        let slice = fixture_slice(ramp);
        let spec = ResolutionSpec::SpatialResample {
            mode: SamplingMode::Over,
            percentage: 50.0,
        };
        let out = apply(&slice, &spec).unwrap();
        assert_eq!(out.dim(), (6, 9));

        for ((i, j), &v) in out.data().indexed_iter() {
            let y = i as f64 * 3.0 / 5.0;
            let x = j as f64 * 5.0 / 8.0;
            assert_abs_diff_eq!(v, 10.0 * y + x, epsilon = 1e-12);
        }
        assert_eq!(out.data()[[5, 8]], 35.0);
    }

    #[test]
    fn test_negative_percentage_rejected() {
        let slice = fixture_slice(gradient(4, 4));
        let spec = ResolutionSpec::SpatialResample {
            mode: SamplingMode::Over,
            percentage: -10.0,
        };
        assert!(matches!(
            apply(&slice, &spec),
            Err(EngineError::InvalidParameter {
                name: "percentage",
                ..
            })
        ));
    }

    // ==================== Quantization Tests ====================

    #[test]
    fn test_one_bit_gives_two_levels() {
        let img = random_matrix(16, 16, 21).mapv(|v| v * 3000.0 - 1000.0);
        let slice = fixture_slice(img.clone());
        let out = apply(&slice, &ResolutionSpec::RadiometricQuantize { bits: 1 }).unwrap();

        let levels: BTreeSet<u64> = out.data().iter().map(|v| v.to_bits()).collect();
        assert_eq!(levels.len(), 2);

        let (lo, hi) = min_max(img.view());
        let (out_lo, out_hi) = min_max(out.view());
        assert_abs_diff_eq!(out_lo, lo, epsilon = 1e-9);
        assert_abs_diff_eq!(out_hi, hi, epsilon = 1e-9);
    }

    #[test]
    fn test_quantize_levels_bounded() {
        let slice = fixture_slice(random_matrix(32, 32, 4));
        let out = apply(&slice, &ResolutionSpec::RadiometricQuantize { bits: 3 }).unwrap();
        let levels: BTreeSet<u64> = out.data().iter().map(|v| v.to_bits()).collect();
        assert!(levels.len() <= 8);
        assert!(levels.len() > 2);
    }

    #[test]
    fn test_quantize_noop_cases() {
        let img = random_matrix(5, 5, 2);
        let slice = fixture_slice(img.clone());
        let out = apply(&slice, &ResolutionSpec::RadiometricQuantize { bits: 16 }).unwrap();
        assert_eq!(out.data(), &img);

        let flat = fixture_slice(Array2::from_elem((3, 4), 12.0));
        let out = apply(&flat, &ResolutionSpec::RadiometricQuantize { bits: 2 }).unwrap();
        assert_eq!(out.data(), flat.data());
    }

    #[test]
    fn test_zero_bits_rejected() {
        let slice = fixture_slice(gradient(3, 3));
        let err = apply(&slice, &ResolutionSpec::RadiometricQuantize { bits: 0 }).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name: "bits", .. }));
    }

    // ==================== Temporal Blur Tests ====================

    #[test]
    fn test_motion_taps_normalized() {
        let taps = motion_taps(MOTION_TAPS + 20, 1.0);
        assert_abs_diff_eq!(taps.sum(), 1.0, epsilon = 1e-12);
        assert!(taps.iter().skip(MOTION_TAPS).all(|&t| t == 0.0));
        assert!(taps.windows(2).into_iter().all(|w| w[0] >= w[1]));

        let short = motion_taps(10, 1.0);
        assert_abs_diff_eq!(short.sum(), 1.0, epsilon = 1e-12);
        assert!(short.windows(2).into_iter().all(|w| w[0] >= w[1]));
        // Same shape as the long kernel, rescaled over the kept taps.
        assert_abs_diff_eq!(short[3] / short[0], taps[3] / taps[0], epsilon = 1e-12);
    }

    #[test]
    fn test_short_axis_blur_keeps_brightness() {
        let img = Array2::from_elem((10, 4), 100.0);
        let slice = fixture_slice(img);
        let spec = ResolutionSpec::TemporalBlur {
            axis: MotionAxis::Vertical,
            intensity_percent: 100.0,
        };
        let out = apply(&slice, &spec).unwrap();
        // Row 0 sees the whole one-sided kernel.
        for &v in out.data().row(0) {
            assert_abs_diff_eq!(v, 100.0, epsilon = 1e-9);
        }
        assert!(out.data().iter().all(|&v| v >= 100.0 - 1e-9));
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let img = random_matrix(8, 6, 12);
        let slice = fixture_slice(img.clone());
        for axis in [MotionAxis::Vertical, MotionAxis::Horizontal, MotionAxis::Both] {
            let spec = ResolutionSpec::TemporalBlur {
                axis,
                intensity_percent: 0.0,
            };
            assert_eq!(apply(&slice, &spec).unwrap().data(), &img);
        }
    }

    #[test]
    fn test_tiny_intensity_converges_to_identity() {
        let img = random_matrix(8, 6, 13);
        let slice = fixture_slice(img.clone());
        let spec = ResolutionSpec::TemporalBlur {
            axis: MotionAxis::Both,
            intensity_percent: 0.1,
        };
        let out = apply(&slice, &spec).unwrap();
        assert!(max_abs_diff(out.data(), &img) < 1e-12);
    }

    #[test]
    fn test_vertical_blur_matches_taps() {
        let img = gradient(3, 2);
        let slice = fixture_slice(img.clone());
        let spec = ResolutionSpec::TemporalBlur {
            axis: MotionAxis::Vertical,
            intensity_percent: 100.0,
        };
        let out = apply(&slice, &spec).unwrap();
        let t = motion_taps(3, 1.0);
        for c in 0..2 {
            let expected = t[0] * img[[0, c]] + t[1] * img[[1, c]] + t[2] * img[[2, c]];
            assert_abs_diff_eq!(out.data()[[0, c]], expected, epsilon = 1e-12);
            let expected = t[1] * img[[0, c]] + t[0] * img[[1, c]] + t[1] * img[[2, c]];
            assert_abs_diff_eq!(out.data()[[1, c]], expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_horizontal_is_transposed_vertical() {
        let img = random_matrix(5, 7, 14);
        let vertical = apply(
            &fixture_slice(img.t().to_owned()),
            &ResolutionSpec::TemporalBlur {
                axis: MotionAxis::Vertical,
                intensity_percent: 60.0,
            },
        )
        .unwrap();
        let horizontal = apply(
            &fixture_slice(img),
            &ResolutionSpec::TemporalBlur {
                axis: MotionAxis::Horizontal,
                intensity_percent: 60.0,
            },
        )
        .unwrap();
        assert!(max_abs_diff(horizontal.data(), &vertical.data().t().to_owned()) < 1e-12);
    }

    #[test]
    fn test_both_axes_composes() {
        let img = random_matrix(6, 4, 15);
        let slice = fixture_slice(img);
        let blur = |axis| {
            ResolutionSpec::TemporalBlur {
                axis,
                intensity_percent: 40.0,
            }
        };
        let both = apply(&slice, &blur(MotionAxis::Both)).unwrap();
        let stepwise = apply(
            &apply(&slice, &blur(MotionAxis::Vertical)).unwrap(),
            &blur(MotionAxis::Horizontal),
        )
        .unwrap();
        assert!(max_abs_diff(both.data(), stepwise.data()) < 1e-12);
        assert_eq!(both.range(), slice.range());
    }

    #[test]
    fn test_temporal_blur_f32() {
        let img = random_matrix(6, 6, 16).mapv(|v| v as f32);
        let slice = Slice::from_array(img);
        let spec = ResolutionSpec::TemporalBlur {
            axis: MotionAxis::Vertical,
            intensity_percent: 50.0,
        };
        let out = apply(&slice, &spec).unwrap();
        assert_eq!(out.dim(), (6, 6));
        assert!(out.data().iter().all(|v| v.is_finite()));
    }
}
