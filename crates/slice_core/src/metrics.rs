//! Objective image-quality metrics.
//!
//! Both operands are min–max normalized to `[0, 1]` independently before
//! comparison (a flat operand is compared as-is), so every metric is computed
//! with a data range of 1.

use log::{debug, warn};
use ndarray::{s, Array2, ArrayView2, Zip};

use crate::convolution::uniform_filter;
use crate::error::{EngineError, Result};
use crate::float_trait::SliceFloat;
use crate::slice::{min_max, normalize_unit};

/// Default SSIM window side
pub const DEFAULT_SSIM_WINDOW: usize = 7;

/// Default SSIM luminance stabilizer coefficient
pub const DEFAULT_SSIM_K1: f64 = 0.01;

/// Default SSIM contrast stabilizer coefficient
pub const DEFAULT_SSIM_K2: f64 = 0.03;

/// PSNR, IOSNR, MAE and SSIM of a candidate against a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    /// Peak signal-to-noise ratio in dB. `+∞` for identical images.
    pub psnr: f64,
    /// Improvement-in-output SNR in dB, `10·log10(mean(ref²) / mse)`.
    pub iosnr: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Mean structural similarity.
    pub ssim: f64,
}

/// SSIM window settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// Side of the square uniform window; odd, >= 3. Default: 7
    pub window_size: usize,
    /// Default: 0.01
    pub k1: f64,
    /// Default: 0.03
    pub k2: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_SSIM_WINDOW,
            k1: DEFAULT_SSIM_K1,
            k2: DEFAULT_SSIM_K2,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 3 || self.window_size % 2 == 0 {
            return Err(EngineError::invalid(
                "window_size",
                format!("must be odd and >= 3, got {}", self.window_size),
            ));
        }
        for (name, k) in [("k1", self.k1), ("k2", self.k2)] {
            if !(k.is_finite() && k > 0.0) {
                return Err(EngineError::invalid(
                    name,
                    format!("must be finite and > 0, got {k}"),
                ));
            }
        }
        Ok(())
    }
}

/// Compare `candidate` against `reference` with the standard SSIM settings.
pub fn metrics<F: SliceFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
) -> Result<QualityMetrics> {
    metrics_with_config(reference, candidate, &MetricsConfig::default())
}

pub fn metrics_with_config<F: SliceFloat>(
    reference: ArrayView2<F>,
    candidate: ArrayView2<F>,
    config: &MetricsConfig,
) -> Result<QualityMetrics> {
    config.validate()?;
    if reference.dim() != candidate.dim() {
        return Err(EngineError::ShapeMismatch {
            expected: reference.dim(),
            actual: candidate.dim(),
        });
    }
    let (rows, cols) = reference.dim();
    if rows < config.window_size || cols < config.window_size {
        return Err(EngineError::invalid(
            "window_size",
            format!(
                "image {:?} is smaller than the {}×{} SSIM window",
                (rows, cols),
                config.window_size,
                config.window_size
            ),
        ));
    }
    debug!("metrics on {:?} images", (rows, cols));

    let x = unit_f64(reference);
    let y = unit_f64(candidate);

    let count = (rows * cols) as f64;
    let (mut sq_err, mut abs_err, mut ref_energy) = (0.0, 0.0, 0.0);
    Zip::from(&x).and(&y).for_each(|&a, &b| {
        let d = a - b;
        sq_err += d * d;
        abs_err += d.abs();
        ref_energy += a * a;
    });
    let mse = sq_err / count;

    Ok(QualityMetrics {
        psnr: 10.0 * (1.0 / mse).log10(),
        iosnr: 10.0 * ((ref_energy / count) / mse).log10(),
        mae: abs_err / count,
        ssim: mean_ssim(&x, &y, config),
    })
}

/// Widen to f64 and normalize to `[0, 1]`.
fn unit_f64<F: SliceFloat>(view: ArrayView2<F>) -> Array2<f64> {
    let (lo, hi) = min_max(view);
    if lo == hi {
        warn!("metrics: flat operand, comparing without normalization");
    }
    normalize_unit(view.mapv(|v| v.to_f64_c()).view())
}

/// Mean SSIM with a uniform window and sample covariance, averaged over the
/// region at least half a window from the border.
fn mean_ssim(x: &Array2<f64>, y: &Array2<f64>, config: &MetricsConfig) -> f64 {
    let win = config.window_size;
    let np = (win * win) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = config.k1 * config.k1;
    let c2 = config.k2 * config.k2;

    let ux = uniform_filter(x.view(), win);
    let uy = uniform_filter(y.view(), win);
    let uxx = uniform_filter((x * x).view(), win);
    let uyy = uniform_filter((y * y).view(), win);
    let uxy = uniform_filter((x * y).view(), win);

    let mut ssim_map = Array2::<f64>::zeros(x.dim());
    Zip::from(&mut ssim_map)
        .and(&ux)
        .and(&uy)
        .and(&uxx)
        .and(&uyy)
        .and(&uxy)
        .for_each(|out, &mx, &my, &mxx, &myy, &mxy| {
            let vx = cov_norm * (mxx - mx * mx);
            let vy = cov_norm * (myy - my * my);
            let vxy = cov_norm * (mxy - mx * my);
            let a1 = 2.0 * mx * my + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = mx * mx + my * my + c1;
            let b2 = vx + vy + c2;
            *out = (a1 * a2) / (b1 * b2);
        });

    let pad = (win - 1) / 2;
    let (rows, cols) = x.dim();
    ssim_map
        .slice(s![pad..rows - pad, pad..cols - pad])
        .mean()
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{checkerboard, gradient, random_matrix};
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::Normal;

    // ==================== Identity Tests ====================

    #[test]
    fn test_identical_images() {
        let img = random_matrix(16, 12, 40);
        let m = metrics(img.view(), img.view()).unwrap();
        assert_eq!(m.psnr, f64::INFINITY);
        assert_eq!(m.iosnr, f64::INFINITY);
        assert_eq!(m.mae, 0.0);
        assert_abs_diff_eq!(m.ssim, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_affine_rescale_is_invisible() {
        // Independent normalization removes gain and offset.
        let img = gradient(9, 9);
        let scaled = img.mapv(|v| 3.0 * v - 250.0);
        let m = metrics(img.view(), scaled.view()).unwrap();
        assert!(m.mae < 1e-12);
        assert!(m.psnr > 200.0);
        assert_abs_diff_eq!(m.ssim, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_identical_f32_images() {
        let img = random_matrix(8, 8, 41).mapv(|v| v as f32);
        let m = metrics(img.view(), img.view()).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.psnr, f64::INFINITY);
    }

    // ==================== Known-value Tests ====================

    #[test]
    fn test_inverted_checkerboard() {
        let board = checkerboard(8, 8, 2);
        let inverted = board.mapv(|v| 1.0 - v);
        let m = metrics(board.view(), inverted.view()).unwrap();
        assert_abs_diff_eq!(m.mae, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.psnr, 0.0, epsilon = 1e-12);
        // mean(ref²) = 0.5, mse = 1.
        assert_abs_diff_eq!(m.iosnr, 10.0 * 0.5f64.log10(), epsilon = 1e-12);
        assert!(m.ssim < 0.0);
    }

    #[test]
    fn test_noise_lowers_quality_monotonically() {
        let clean = checkerboard(32, 32, 4);
        let mut rng = StdRng::seed_from_u64(42);
        let unit = Normal::new(0.0, 1.0).unwrap();
        let noise = Array2::from_shape_fn((32, 32), |_| unit.sample(&mut rng));

        let mut last_ssim = f64::INFINITY;
        let mut last_psnr = f64::INFINITY;
        for sigma in [0.05, 0.2, 0.5] {
            let noisy = &clean + &noise.mapv(|z| z * sigma);
            let m = metrics(clean.view(), noisy.view()).unwrap();
            assert!(m.ssim < last_ssim);
            assert!(m.psnr < last_psnr);
            assert!(m.mae > 0.0);
            last_ssim = m.ssim;
            last_psnr = m.psnr;
        }
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_shape_mismatch() {
        let a = random_matrix(8, 8, 1);
        let b = random_matrix(8, 9, 2);
        let err = metrics(a.view(), b.view()).unwrap_err();
        assert_eq!(
            err,
            EngineError::ShapeMismatch {
                expected: (8, 8),
                actual: (8, 9)
            }
        );
    }

    #[test]
    fn test_image_smaller_than_window() {
        let a = random_matrix(6, 20, 3);
        assert!(matches!(
            metrics(a.view(), a.view()),
            Err(EngineError::InvalidParameter {
                name: "window_size",
                ..
            })
        ));

        let small = MetricsConfig {
            window_size: 3,
            ..Default::default()
        };
        assert!(metrics_with_config(a.view(), a.view(), &small).is_ok());
    }

    #[test]
    fn test_config_validation() {
        for window_size in [0, 1, 4] {
            let cfg = MetricsConfig {
                window_size,
                ..Default::default()
            };
            assert!(cfg.validate().is_err());
        }
        let cfg = MetricsConfig {
            k2: -0.03,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
