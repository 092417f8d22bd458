//! Symmetric Toeplitz operators.
//!
//! A 1D blur along one image axis is represented as a dense `n × n` matrix
//! constant along each diagonal. The temporal motion blur and the restoration
//! degradation operator are both built from this one routine.

use ndarray::{Array2, ArrayView1};

use crate::float_trait::SliceFloat;

/// Build the symmetric Toeplitz matrix whose first column (and row) is `column`.
///
/// `t[[i, j]] = column[|i - j|]`.
pub fn symmetric_toeplitz<F: SliceFloat>(column: ArrayView1<F>) -> Array2<F> {
    let n = column.len();
    Array2::from_shape_fn((n, n), |(i, j)| column[i.abs_diff(j)])
}

/// Symmetric Toeplitz matrix of size `n` whose leading diagonals are `taps`
/// (`taps[0]` on the main diagonal) and zero beyond.
///
/// Taps past `n` are dropped.
pub fn banded_toeplitz<F: SliceFloat>(n: usize, taps: &[F]) -> Array2<F> {
    let mut column = ndarray::Array1::zeros(n);
    for (dst, &tap) in column.iter_mut().zip(taps) {
        *dst = tap;
    }
    symmetric_toeplitz(column.view())
}
