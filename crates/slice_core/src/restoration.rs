//! Restoration Engine
//!
//! Simulates a blurred, noisy observation of a slice and restores it with one
//! of four regularized linear estimators. The blur acts along rows: every
//! column of the image is degraded by the same `M × M` symmetric Toeplitz
//! operator `S` built from `|sinc|` taps, so each estimator is a dense
//! `M × M` solve applied to all columns at once.
//!
//! ## Estimators
//!
//! - **LS**: `(SᵗS)⁻¹ SᵗU`
//! - **CLS**: `(SᵗS + αI)⁻¹ SᵗU`
//! - **WCLS**: CLS baseline plus a correction weighted by the noise precision
//!   and a second-difference smoothness prior
//! - **BMR**: CLS baseline plus a Bayesian correction using the sample signal
//!   covariance as prior

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};
use rand::prelude::*;
use rand_distr::Normal;

use crate::error::{EngineError, Result};
use crate::float_trait::SliceFloat;
use crate::slice::Slice;
use crate::toeplitz::{banded_toeplitz, symmetric_toeplitz};

// =============================================================================
// Constants
// =============================================================================

/// Default dispersion width `K` of the blur operator
pub const DEFAULT_DISPERSION_WIDTH: usize = 10;

/// Default noise variance `N0`
pub const DEFAULT_NOISE_VARIANCE: f64 = 0.1;

/// Default regularization weight `α`
pub const DEFAULT_ALPHA: f64 = 0.1;

/// Default smoothness weight `m1` for WCLS
pub const DEFAULT_WEIGHT_M1: f64 = 0.3;

/// Diagonal loading added to the BMR signal covariance
const SIGNAL_COVARIANCE_LOADING: f64 = 0.1;

// =============================================================================
// Types
// =============================================================================

/// Restoration estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RestorationMethod {
    /// Plain least squares.
    Ls,
    /// Constrained (Tikhonov-regularized) least squares.
    #[default]
    Cls,
    /// Weighted CLS with a smoothness prior.
    Wcls,
    /// Bayesian mean restoration.
    Bmr,
}

impl RestorationMethod {
    pub const ALL: [RestorationMethod; 4] = [
        RestorationMethod::Ls,
        RestorationMethod::Cls,
        RestorationMethod::Wcls,
        RestorationMethod::Bmr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RestorationMethod::Ls => "LS",
            RestorationMethod::Cls => "CLS",
            RestorationMethod::Wcls => "WCLS",
            RestorationMethod::Bmr => "BMR",
        }
    }
}

impl fmt::Display for RestorationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RestorationMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        RestorationMethod::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                EngineError::invalid("method", format!("unknown restoration method `{s}`"))
            })
    }
}

/// Parameters for one degrade-and-restore run.
///
/// All parameters default to the values the viewer uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestorationRequest {
    /// Dispersion width `K` of the blur operator. Default: 10
    pub dispersion_width: usize,
    /// Variance `N0` of the additive Gaussian noise. Default: 0.1
    pub noise_variance: f64,
    /// Regularization weight `α` (CLS, WCLS, and the baseline of BMR). Default: 0.1
    pub alpha: f64,
    /// Smoothness-prior weight `m1` (WCLS). Default: 0.3
    pub weight_m1: f64,
    /// Estimator. Default: CLS
    pub method: RestorationMethod,
    /// Noise seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RestorationRequest {
    fn default() -> Self {
        Self {
            dispersion_width: DEFAULT_DISPERSION_WIDTH,
            noise_variance: DEFAULT_NOISE_VARIANCE,
            alpha: DEFAULT_ALPHA,
            weight_m1: DEFAULT_WEIGHT_M1,
            method: RestorationMethod::default(),
            seed: None,
        }
    }
}

impl RestorationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: RestorationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the request parameters.
    pub fn validate(&self) -> Result<()> {
        if self.dispersion_width == 0 {
            return Err(EngineError::invalid("dispersion_width", "must be >= 1"));
        }
        let n0 = self.noise_variance;
        if !(n0.is_finite() && n0 >= 0.0) {
            return Err(EngineError::invalid(
                "noise_variance",
                format!("must be finite and >= 0, got {n0}"),
            ));
        }
        if n0 == 0.0 && matches!(self.method, RestorationMethod::Wcls | RestorationMethod::Bmr) {
            return Err(EngineError::invalid(
                "noise_variance",
                format!("{} needs a positive noise variance", self.method),
            ));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(EngineError::invalid(
                "alpha",
                format!("must be finite and >= 0, got {}", self.alpha),
            ));
        }
        if !self.weight_m1.is_finite() {
            return Err(EngineError::invalid(
                "weight_m1",
                format!("must be finite, got {}", self.weight_m1),
            ));
        }
        Ok(())
    }
}

/// Restored estimate together with the simulated observation it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorationResult<F: SliceFloat> {
    pub restored: Slice<F>,
    pub degraded: Slice<F>,
}

// =============================================================================
// Operators
// =============================================================================

/// Normalized sinc, `sin(πx)/(πx)` with `sinc(0) = 1`.
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

/// Blur operator `S` for an image of height `m` and dispersion width `k`.
///
/// Taps are `a[0] = 1`, `a[i] = |sinc(i / (k/2))|` for `i` in `1..=2·(k/2)`,
/// zero beyond; `S` is normalized so its centre row sums to one. With
/// `k/2 == 0` the operator is the identity.
pub fn degradation_operator(m: usize, k: usize) -> Result<DMatrix<f64>> {
    let half = k / 2;
    if m <= 2 * half {
        return Err(EngineError::invalid(
            "dispersion_width",
            format!(
                "slice height {m} must exceed 2·(K/2) = {} for K = {k}",
                2 * half
            ),
        ));
    }

    let mut taps = Array1::<f64>::zeros(m);
    taps[0] = 1.0;
    for i in 1..=2 * half {
        taps[i] = sinc(i as f64 / half as f64).abs();
    }
    let s = symmetric_toeplitz(taps.view());
    let centre_sum = s.row(m / 2).sum();

    Ok(DMatrix::from_fn(m, m, |r, c| s[[r, c]] / centre_sum))
}

/// WCLS smoothness prior `I + m1·D`, where `D` is the second-difference
/// Toeplitz matrix (`2` on the diagonal, `-1` beside it) with both corner
/// entries set to `1`.
pub fn smoothness_prior(m: usize, m1: f64) -> DMatrix<f64> {
    let mut d = banded_toeplitz(m, &[2.0, -1.0]);
    if m > 0 {
        d[[0, 0]] = 1.0;
        d[[m - 1, m - 1]] = 1.0;
    }
    DMatrix::from_fn(m, m, |r, c| {
        let identity = if r == c { 1.0 } else { 0.0 };
        identity + m1 * d[[r, c]]
    })
}

fn to_matrix<F: SliceFloat>(view: ArrayView2<F>) -> DMatrix<f64> {
    let (rows, cols) = view.dim();
    DMatrix::from_fn(rows, cols, |r, c| view[[r, c]].to_f64_c())
}

fn to_array<F: SliceFloat>(matrix: &DMatrix<f64>) -> Array2<F> {
    Array2::from_shape_fn(matrix.shape(), |(r, c)| F::from_f64_c(matrix[(r, c)]))
}

/// LU solve of `system · x = rhs`.
fn solve(system: DMatrix<f64>, rhs: &DMatrix<f64>, stage: &str) -> Result<DMatrix<f64>> {
    let solution = system
        .lu()
        .solve(rhs)
        .ok_or_else(|| EngineError::NumericalFailure(format!("{stage}: singular system")))?;
    ensure_finite(solution, stage)
}

fn ensure_finite(matrix: DMatrix<f64>, stage: &str) -> Result<DMatrix<f64>> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(matrix)
    } else {
        Err(EngineError::NumericalFailure(format!(
            "{stage}: non-finite result"
        )))
    }
}

fn invert(matrix: DMatrix<f64>, stage: &str) -> Result<DMatrix<f64>> {
    let inverse = matrix
        .try_inverse()
        .ok_or_else(|| EngineError::NumericalFailure(format!("{stage}: matrix not invertible")))?;
    ensure_finite(inverse, stage)
}

// =============================================================================
// Entry points
// =============================================================================

/// Degrade `slice` and restore it as `request` describes.
///
/// Noise comes from a `StdRng` seeded with `request.seed`, or from OS entropy
/// when no seed is set.
pub fn restore<F: SliceFloat>(
    slice: &Slice<F>,
    request: &RestorationRequest,
) -> Result<RestorationResult<F>> {
    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    restore_with_rng(slice, request, &mut rng)
}

/// Same as [`restore`], drawing the noise from a caller-owned generator.
/// `request.seed` is ignored.
pub fn restore_with_rng<F: SliceFloat, R: Rng + ?Sized>(
    slice: &Slice<F>,
    request: &RestorationRequest,
    rng: &mut R,
) -> Result<RestorationResult<F>> {
    request.validate()?;
    let (m, n) = slice.dim();
    debug!(
        "restore {} on {:?} slice (K={}, N0={}, alpha={}, m1={})",
        request.method,
        (m, n),
        request.dispersion_width,
        request.noise_variance,
        request.alpha,
        request.weight_m1
    );

    let s = degradation_operator(m, request.dispersion_width)?;
    let v = to_matrix(slice.view());

    let normal = Normal::new(0.0, request.noise_variance.sqrt())
        .map_err(|e| EngineError::invalid("noise_variance", e.to_string()))?;
    let noise = DMatrix::from_fn(m, n, |_, _| normal.sample(&mut *rng));
    let u = &s * &v + noise;
    trace!("degraded observation built");

    let restored = estimate(request, &s, &v, &u)?;

    Ok(RestorationResult {
        restored: slice.with_data(to_array(&restored)),
        degraded: slice.with_data(to_array(&u)),
    })
}

/// Run the requested estimator on observation `u`.
fn estimate(
    request: &RestorationRequest,
    s: &DMatrix<f64>,
    v: &DMatrix<f64>,
    u: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let m = s.nrows();
    let identity = DMatrix::<f64>::identity(m, m);
    let st = s.transpose();
    let sts = &st * s;
    let stu = &st * u;

    let cls = || solve(&sts + &identity * request.alpha, &stu, "CLS");

    match request.method {
        RestorationMethod::Ls => solve(sts.clone(), &stu, "LS"),
        RestorationMethod::Cls => cls(),
        RestorationMethod::Wcls => {
            let mv = cls()?;
            trace!("WCLS baseline solved");
            let precision = 1.0 / request.noise_variance;
            let prior = smoothness_prior(m, request.weight_m1);

            // Mu = I/N0, so SᵗMuS = SᵗS/N0 and SᵗMu = Sᵗ/N0.
            let system = &sts * precision + prior * request.alpha;
            let residual = u - s * &mv;
            let rhs = (&st * residual) * precision;
            let correction = solve(system, &rhs, "WCLS")?;
            Ok(mv + correction)
        }
        RestorationMethod::Bmr => {
            let mv = cls()?;
            trace!("BMR baseline solved");
            let noise_precision = invert(&identity * request.noise_variance, "BMR noise covariance")?;

            let centred = v.add_scalar(-v.mean());
            let signal_cov = &centred * centred.transpose() + &identity * SIGNAL_COVARIANCE_LOADING;
            let signal_precision = invert(signal_cov, "BMR signal covariance")?;

            let st_mu = &st * &noise_precision;
            let system = &st_mu * s + signal_precision;
            let residual = u - s * &mv;
            let rhs = &st_mu * residual;
            let correction = solve(system, &rhs, "BMR")?;
            Ok(mv + correction)
        }
    }
}
