//! Deterministic fixtures shared by the unit tests.

use ndarray::Array2;
use rand::prelude::*;

use crate::slice::{Slice, VolumeRange};

/// Fill value used by fixtures; strictly below every fixture sample.
pub const FIXTURE_FILL: f64 = -1000.0;

/// Binary checkerboard with `block`-pixel squares, values 0 and 1.
pub fn checkerboard(rows: usize, cols: usize, block: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        if (r / block + c / block) % 2 == 0 {
            1.0
        } else {
            0.0
        }
    })
}

/// Unique, strictly positive values: `r * cols + c + 1`.
pub fn gradient(rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c + 1) as f64)
}

pub fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
}

/// Wrap fixture pixels with the fixture border pair.
pub fn fixture_slice(data: Array2<f64>) -> Slice<f64> {
    let max = data.iter().copied().fold(FIXTURE_FILL, f64::max);
    Slice::new(data, VolumeRange::new(FIXTURE_FILL, max))
}

pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    assert_eq!(a.dim(), b.dim(), "shape mismatch in comparison");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
