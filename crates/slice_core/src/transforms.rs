use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::float_trait::SliceFloat;

/// Forward and inverse FFT plans for one `rows × cols` image shape.
///
/// Planning is the expensive part of rustfft; build once per shape and reuse
/// across images of that shape.
pub struct FftPlans<F: SliceFloat> {
    row_forward: Arc<dyn Fft<F>>,
    col_forward: Arc<dyn Fft<F>>,
    row_inverse: Arc<dyn Fft<F>>,
    col_inverse: Arc<dyn Fft<F>>,
}

impl<F: SliceFloat> FftPlans<F> {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            row_forward: planner.plan_fft_forward(cols),
            col_forward: planner.plan_fft_forward(rows),
            row_inverse: planner.plan_fft_inverse(cols),
            col_inverse: planner.plan_fft_inverse(rows),
        }
    }

    /// Unnormalized 2D FFT of a real image.
    pub fn forward(&self, input: ArrayView2<F>) -> Array2<Complex<F>> {
        fft2d(input, &self.row_forward, &self.col_forward)
    }

    /// Real part of the normalized 2D inverse FFT.
    pub fn inverse_real(&self, input: &Array2<Complex<F>>) -> Array2<F> {
        ifft2d(input, &self.row_inverse, &self.col_inverse)
    }
}

/// Compute the 2D FFT of an image using pre-computed plans.
/// Returns unnormalized FFT.
pub fn fft2d<F: SliceFloat>(
    input: ArrayView2<F>,
    fft_row_plan: &Arc<dyn Fft<F>>,
    fft_col_plan: &Arc<dyn Fft<F>>,
) -> Array2<Complex<F>> {
    let (rows, cols) = input.dim();

    // 1. Transform rows
    let mut intermediate = Array2::<Complex<F>>::zeros((rows, cols));
    let mut row_vec = vec![Complex::new(F::zero(), F::zero()); cols];

    for (r, in_row) in input.rows().into_iter().enumerate() {
        for (dst, &v) in row_vec.iter_mut().zip(in_row.iter()) {
            *dst = Complex::new(v, F::zero());
        }
        fft_row_plan.process(&mut row_vec);
        for (c, &v) in row_vec.iter().enumerate() {
            intermediate[[r, c]] = v;
        }
    }

    // 2. Transform columns in place
    let mut col_vec = vec![Complex::new(F::zero(), F::zero()); rows];

    for c in 0..cols {
        for r in 0..rows {
            col_vec[r] = intermediate[[r, c]];
        }
        fft_col_plan.process(&mut col_vec);
        for r in 0..rows {
            intermediate[[r, c]] = col_vec[r];
        }
    }

    intermediate
}

/// Compute the 2D inverse FFT using pre-computed plans, keeping the real part.
/// Normalizes by 1/(rows*cols).
pub fn ifft2d<F: SliceFloat>(
    input: &Array2<Complex<F>>,
    ifft_row_plan: &Arc<dyn Fft<F>>,
    ifft_col_plan: &Arc<dyn Fft<F>>,
) -> Array2<F> {
    let (rows, cols) = input.dim();

    // 1. Transform columns
    let mut intermediate = input.clone();
    let mut col_vec = vec![Complex::new(F::zero(), F::zero()); rows];

    for c in 0..cols {
        for r in 0..rows {
            col_vec[r] = intermediate[[r, c]];
        }
        ifft_col_plan.process(&mut col_vec);
        for r in 0..rows {
            intermediate[[r, c]] = col_vec[r];
        }
    }

    // 2. Transform rows
    let mut output = Array2::<F>::zeros((rows, cols));
    if rows == 0 || cols == 0 {
        return output;
    }
    let norm_factor = F::one() / F::usize_as(rows * cols);
    let mut row_vec = vec![Complex::new(F::zero(), F::zero()); cols];

    for r in 0..rows {
        for c in 0..cols {
            row_vec[c] = intermediate[[r, c]];
        }
        ifft_row_plan.process(&mut row_vec);
        for c in 0..cols {
            output[[r, c]] = row_vec[c].re * norm_factor;
        }
    }

    output
}

/// Circularly roll both axes: `out[(r + dr) % rows, (c + dc) % cols] = in[r, c]`.
fn roll2d<T: Clone>(input: &Array2<T>, dr: isize, dc: isize) -> Array2<T> {
    let (rows, cols) = input.dim();
    if rows == 0 || cols == 0 {
        return input.clone();
    }
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let src_r = (r as isize - dr).rem_euclid(rows as isize) as usize;
        let src_c = (c as isize - dc).rem_euclid(cols as isize) as usize;
        input[[src_r, src_c]].clone()
    })
}

/// Move the zero-frequency bin to the centre (`rows / 2`, `cols / 2`).
pub fn fftshift<T: Clone>(input: &Array2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    roll2d(input, (rows / 2) as isize, (cols / 2) as isize)
}

/// Inverse of [`fftshift`]; differs from it only for odd sizes.
pub fn ifftshift<T: Clone>(input: &Array2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    roll2d(input, -((rows / 2) as isize), -((cols / 2) as isize))
}
