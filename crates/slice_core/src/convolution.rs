//! 2D convolution with symmetric boundary handling.
//!
//! True convolution (kernel flipped), output the same size as the input,
//! borders extended by half-sample reflection (`a b c | c b a`). The spatial
//! filters and the SSIM window both run through here.
//!
//! The input is copied once into a pre-padded buffer so the inner loop is
//! branch-free; large images convolve rows in parallel.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::float_trait::SliceFloat;

/// Minimum row count before rows are convolved in parallel.
/// Below this the rayon overhead dominates a 3×3 kernel.
const PARALLEL_ROW_THRESHOLD: usize = 256;

/// Map any index onto `[0, len)` by half-sample symmetric reflection.
///
/// `reflect(-1) = 0`, `reflect(-2) = 1`, `reflect(len) = len - 1`; indices
/// further out keep folding, so kernels wider than the image stay valid.
#[inline(always)]
pub(crate) fn reflect_index(idx: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let folded = idx.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - 1 - folded) as usize
    }
}

/// Copy `input` into a buffer extended by `pad_y` rows and `pad_x` columns of
/// symmetric reflection on every side.
fn pad_symmetric<F: SliceFloat>(input: ArrayView2<F>, pad_y: usize, pad_x: usize) -> Array2<F> {
    let (rows, cols) = input.dim();
    Array2::from_shape_fn((rows + 2 * pad_y, cols + 2 * pad_x), |(r, c)| {
        let src_r = reflect_index(r as isize - pad_y as isize, rows);
        let src_c = reflect_index(c as isize - pad_x as isize, cols);
        input[[src_r, src_c]]
    })
}

/// Convolve `image` with an odd-sized `kernel`, symmetric boundary, same-size output.
///
/// Matches `convolve2d(image, kernel, mode='same', boundary='symm')`.
pub fn convolve2d_symmetric<F: SliceFloat>(
    image: ArrayView2<F>,
    kernel: ArrayView2<F>,
) -> Array2<F> {
    let (rows, cols) = image.dim();
    let (k_rows, k_cols) = kernel.dim();
    debug_assert!(k_rows % 2 == 1 && k_cols % 2 == 1, "kernel must be odd-sized");

    if rows == 0 || cols == 0 || k_rows == 0 || k_cols == 0 {
        return Array2::zeros((rows, cols));
    }

    let (pad_y, pad_x) = (k_rows / 2, k_cols / 2);
    let padded = pad_symmetric(image, pad_y, pad_x);

    // Flip once so the hot loop is a plain correlation over the padded buffer.
    let mut flipped: Vec<F> = kernel.iter().copied().collect();
    flipped.reverse();

    let convolve_row = |r: usize, out_row: &mut [F]| {
        for (c, out) in out_row.iter_mut().enumerate() {
            let mut sum = F::zero();
            for m in 0..k_rows {
                let window = padded.row(r + m);
                let taps = &flipped[m * k_cols..(m + 1) * k_cols];
                for (n, &tap) in taps.iter().enumerate() {
                    sum += tap * window[c + n];
                }
            }
            *out = sum;
        }
    };

    let mut output = Array2::zeros((rows, cols));

    if rows >= PARALLEL_ROW_THRESHOLD {
        let output_rows: Vec<_> = output.axis_iter_mut(Axis(0)).enumerate().collect();
        output_rows.into_par_iter().for_each(|(r, mut out_row)| {
            let mut buffer = vec![F::zero(); cols];
            convolve_row(r, &mut buffer);
            out_row.iter_mut().zip(&buffer).for_each(|(o, &v)| *o = v);
        });
    } else {
        let mut buffer = vec![F::zero(); cols];
        for (r, mut out_row) in output.axis_iter_mut(Axis(0)).enumerate() {
            convolve_row(r, &mut buffer);
            out_row.iter_mut().zip(&buffer).for_each(|(o, &v)| *o = v);
        }
    }

    output
}

/// Mean over a `size × size` window centred on each pixel, symmetric boundary.
pub(crate) fn uniform_filter<F: SliceFloat>(image: ArrayView2<F>, size: usize) -> Array2<F> {
    let weight = F::one() / F::usize_as(size * size);
    let kernel = Array2::from_elem((size, size), weight);
    convolve2d_symmetric(image, kernel.view())
}
