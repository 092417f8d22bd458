//! Filter Engine: spatial convolution filters and radial frequency-domain filters.
//!
//! Spatial filters run a true 2D convolution with symmetric boundary handling
//! (see [`crate::convolution`]). Frequency filters build a real transfer
//! function `H` on a normalized radial grid and apply it to the centred
//! spectrum: `real(ifft2(ifftshift(fftshift(fft2(image)) · H)))`.

use std::fmt;
use std::str::FromStr;

use log::debug;
use ndarray::Array2;

use crate::convolution::convolve2d_symmetric;
use crate::error::{EngineError, Result};
use crate::float_trait::SliceFloat;
use crate::slice::Slice;
use crate::transforms::{fftshift, ifftshift, FftPlans};

/// One of the 19 named 3×3 edge-detection kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKernel {
    SobelN,
    SobelNE,
    SobelE,
    SobelSE,
    SobelS,
    SobelSW,
    SobelW,
    SobelNW,
    PrewittN,
    PrewittNE,
    PrewittE,
    PrewittSE,
    PrewittS,
    PrewittSW,
    PrewittW,
    PrewittNW,
    /// 4-neighbour Laplacian.
    Laplace,
    /// 8-neighbour Laplacian.
    Laplace8,
    /// Diagonal-neighbour Laplacian.
    LaplaceDiagonal,
}

impl EdgeKernel {
    pub const ALL: [EdgeKernel; 19] = [
        EdgeKernel::SobelN,
        EdgeKernel::SobelNE,
        EdgeKernel::SobelE,
        EdgeKernel::SobelSE,
        EdgeKernel::SobelS,
        EdgeKernel::SobelSW,
        EdgeKernel::SobelW,
        EdgeKernel::SobelNW,
        EdgeKernel::PrewittN,
        EdgeKernel::PrewittNE,
        EdgeKernel::PrewittE,
        EdgeKernel::PrewittSE,
        EdgeKernel::PrewittS,
        EdgeKernel::PrewittSW,
        EdgeKernel::PrewittW,
        EdgeKernel::PrewittNW,
        EdgeKernel::Laplace,
        EdgeKernel::Laplace8,
        EdgeKernel::LaplaceDiagonal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EdgeKernel::SobelN => "Sobel-N",
            EdgeKernel::SobelNE => "Sobel-NE",
            EdgeKernel::SobelE => "Sobel-E",
            EdgeKernel::SobelSE => "Sobel-SE",
            EdgeKernel::SobelS => "Sobel-S",
            EdgeKernel::SobelSW => "Sobel-SW",
            EdgeKernel::SobelW => "Sobel-W",
            EdgeKernel::SobelNW => "Sobel-NW",
            EdgeKernel::PrewittN => "Prewitt-N",
            EdgeKernel::PrewittNE => "Prewitt-NE",
            EdgeKernel::PrewittE => "Prewitt-E",
            EdgeKernel::PrewittSE => "Prewitt-SE",
            EdgeKernel::PrewittS => "Prewitt-S",
            EdgeKernel::PrewittSW => "Prewitt-SW",
            EdgeKernel::PrewittW => "Prewitt-W",
            EdgeKernel::PrewittNW => "Prewitt-NW",
            EdgeKernel::Laplace => "Laplace",
            EdgeKernel::Laplace8 => "Laplace-8",
            EdgeKernel::LaplaceDiagonal => "Laplace-D",
        }
    }

    /// Integer coefficients, row-major.
    pub fn coefficients(self) -> [[i8; 3]; 3] {
        match self {
            EdgeKernel::SobelN => [[1, 2, 1], [0, 0, 0], [-1, -2, -1]],
            EdgeKernel::SobelNE => [[0, 1, 2], [-1, 0, 1], [-2, -1, 0]],
            EdgeKernel::SobelE => [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]],
            EdgeKernel::SobelSE => [[-2, -1, 0], [-1, 0, 1], [0, 1, 2]],
            EdgeKernel::SobelS => [[-1, -2, -1], [0, 0, 0], [1, 2, 1]],
            EdgeKernel::SobelSW => [[0, -1, -2], [1, 0, -1], [2, 1, 0]],
            EdgeKernel::SobelW => [[1, 0, -1], [2, 0, -2], [1, 0, -1]],
            EdgeKernel::SobelNW => [[2, 1, 0], [1, 0, -1], [0, -1, -2]],
            EdgeKernel::PrewittN => [[1, 1, 1], [0, 0, 0], [-1, -1, -1]],
            EdgeKernel::PrewittNE => [[0, 1, 1], [-1, 0, 1], [-1, -1, 0]],
            EdgeKernel::PrewittE => [[-1, 0, 1], [-1, 0, 1], [-1, 0, 1]],
            EdgeKernel::PrewittSE => [[-1, -1, 0], [-1, 0, 1], [0, 1, 1]],
            EdgeKernel::PrewittS => [[-1, -1, -1], [0, 0, 0], [1, 1, 1]],
            EdgeKernel::PrewittSW => [[0, -1, -1], [1, 0, -1], [1, 1, 0]],
            EdgeKernel::PrewittW => [[1, 0, -1], [1, 0, -1], [1, 0, -1]],
            EdgeKernel::PrewittNW => [[1, 1, 0], [1, 0, -1], [0, -1, -1]],
            EdgeKernel::Laplace => [[0, 1, 0], [1, -4, 1], [0, 1, 0]],
            EdgeKernel::Laplace8 => [[1, 1, 1], [1, -8, 1], [1, 1, 1]],
            EdgeKernel::LaplaceDiagonal => [[1, 0, 1], [0, -4, 0], [1, 0, 1]],
        }
    }

    pub fn kernel<F: SliceFloat>(self) -> Array2<F> {
        let coeffs = self.coefficients();
        Array2::from_shape_fn((3, 3), |(r, c)| F::from_f64_c(coeffs[r][c] as f64))
    }
}

impl fmt::Display for EdgeKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EdgeKernel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        EdgeKernel::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EngineError::invalid("kernel", format!("unknown edge kernel `{s}`")))
    }
}

/// Radial window used to synthesize a frequency transfer function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyWindow {
    /// `exp(-dxy² / 2σ²)`
    Gaussian,
    /// `exp(-dxy² / σ)`
    GaussianMod,
    /// Separable `cos(π·dx/2σ)·cos(π·dy/2σ)` inside the `σ` box.
    Cosine,
    /// Triangular `1 - dxy/σ` inside radius `σ`.
    Bartlett,
    /// Raised cosine inside radius `σ`.
    Hanning,
}

impl FrequencyWindow {
    pub const ALL: [FrequencyWindow; 5] = [
        FrequencyWindow::Gaussian,
        FrequencyWindow::GaussianMod,
        FrequencyWindow::Cosine,
        FrequencyWindow::Bartlett,
        FrequencyWindow::Hanning,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FrequencyWindow::Gaussian => "Gaussian",
            FrequencyWindow::GaussianMod => "Gaussian-Mod",
            FrequencyWindow::Cosine => "Cosine",
            FrequencyWindow::Bartlett => "Bartlett",
            FrequencyWindow::Hanning => "Hanning",
        }
    }

    /// Window value at normalized frequency `(dx, dy)` for radius `sigma`.
    fn response(self, dx: f64, dy: f64, sigma: f64) -> f64 {
        let dxy = dx.hypot(dy);
        match self {
            FrequencyWindow::Gaussian => (-(dxy * dxy) / (2.0 * sigma * sigma)).exp(),
            FrequencyWindow::GaussianMod => (-(dxy * dxy) / sigma).exp(),
            FrequencyWindow::Cosine => {
                if dx.abs() < sigma && dy.abs() < sigma {
                    let half = std::f64::consts::FRAC_PI_2 / sigma;
                    (half * dx).cos() * (half * dy).cos()
                } else {
                    0.0
                }
            }
            FrequencyWindow::Bartlett => {
                let t = dxy / sigma;
                if (0.0..=1.0).contains(&t) {
                    1.0 - t
                } else {
                    0.0
                }
            }
            FrequencyWindow::Hanning => {
                if dxy < sigma {
                    0.5 * ((std::f64::consts::PI * dxy / sigma).cos() + 1.0)
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for FrequencyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FrequencyWindow {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        match key.as_str() {
            "gaussian" => Ok(FrequencyWindow::Gaussian),
            "gaussian-mod" => Ok(FrequencyWindow::GaussianMod),
            "cosine" => Ok(FrequencyWindow::Cosine),
            "bartlett" | "barlett" => Ok(FrequencyWindow::Bartlett),
            "hanning" | "hann" => Ok(FrequencyWindow::Hanning),
            _ => Err(EngineError::invalid("window", format!("unknown frequency window `{s}`"))),
        }
    }
}

/// Which filter to run, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterSpec {
    /// Box blur of odd size `kernel_size`, blended as
    /// `blend_factor·filtered + (1 - blend_factor)·image`.
    SpatialLow { kernel_size: usize, blend_factor: f64 },
    /// Edge kernel response scaled by `intensity_factor`.
    SpatialHigh {
        kernel: EdgeKernel,
        intensity_factor: f64,
    },
    /// `H = window^noise_factor`.
    FrequencyLow {
        window: FrequencyWindow,
        radius: f64,
        noise_factor: f64,
    },
    /// `H = (1 - window)·edge_factor`.
    FrequencyHigh {
        window: FrequencyWindow,
        radius: f64,
        edge_factor: f64,
    },
}

impl FilterSpec {
    pub fn validate(&self) -> Result<()> {
        match *self {
            FilterSpec::SpatialLow {
                kernel_size,
                blend_factor,
            } => {
                if kernel_size == 0 || kernel_size % 2 == 0 {
                    return Err(EngineError::invalid(
                        "kernel_size",
                        format!("must be odd and >= 1, got {kernel_size}"),
                    ));
                }
                ensure_finite("blend_factor", blend_factor)
            }
            FilterSpec::SpatialHigh {
                intensity_factor, ..
            } => ensure_finite("intensity_factor", intensity_factor),
            FilterSpec::FrequencyLow {
                radius,
                noise_factor,
                ..
            } => {
                ensure_radius(radius)?;
                ensure_finite("noise_factor", noise_factor)?;
                // H is zero outside compact windows; a negative power would blow up.
                if noise_factor < 0.0 {
                    return Err(EngineError::invalid(
                        "noise_factor",
                        format!("must be >= 0, got {noise_factor}"),
                    ));
                }
                Ok(())
            }
            FilterSpec::FrequencyHigh {
                radius,
                edge_factor,
                ..
            } => {
                ensure_radius(radius)?;
                ensure_finite("edge_factor", edge_factor)
            }
        }
    }
}

fn ensure_radius(radius: f64) -> Result<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(EngineError::invalid(
            "radius",
            format!("must be finite and > 0, got {radius}"),
        ))
    }
}

fn ensure_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be finite, got {value}")))
    }
}

/// Raw window `H` for an image of `shape`, laid out in centred (shifted)
/// frequency order.
///
/// Row `h` of `M` maps to `dx = (h - M/2)/(M/2)`, column `k` of `N` to
/// `dy = (k - N/2)/(N/2)`, so the zero frequency sits at `(M/2, N/2)`.
pub fn transfer_function(
    shape: (usize, usize),
    window: FrequencyWindow,
    radius: f64,
) -> Result<Array2<f64>> {
    ensure_radius(radius)?;
    let (rows, cols) = shape;
    let half_m = rows as f64 / 2.0;
    let half_n = cols as f64 / 2.0;
    Ok(Array2::from_shape_fn(shape, |(h, k)| {
        let dx = (h as f64 - half_m) / half_m;
        let dy = (k as f64 - half_n) / half_n;
        window.response(dx, dy, radius)
    }))
}

/// Run `spec` over `slice`. The output has the input's shape and range.
pub fn apply<F: SliceFloat>(slice: &Slice<F>, spec: &FilterSpec) -> Result<Slice<F>> {
    spec.validate()?;
    debug!("filter {:?} on {:?} slice", spec, slice.dim());

    if slice.is_empty() {
        return Ok(slice.clone());
    }

    let filtered = match *spec {
        FilterSpec::SpatialLow {
            kernel_size,
            blend_factor,
        } => spatial_low(slice, kernel_size, blend_factor),
        FilterSpec::SpatialHigh {
            kernel,
            intensity_factor,
        } => {
            let factor = F::from_f64_c(intensity_factor);
            convolve2d_symmetric(slice.view(), kernel.kernel::<F>().view()).mapv(|v| v * factor)
        }
        FilterSpec::FrequencyLow {
            window,
            radius,
            noise_factor,
        } => {
            let h = transfer_function(slice.dim(), window, radius)?
                .mapv(|v| v.powf(noise_factor));
            frequency_filter(slice, &h)
        }
        FilterSpec::FrequencyHigh {
            window,
            radius,
            edge_factor,
        } => {
            let h = transfer_function(slice.dim(), window, radius)?
                .mapv(|v| (1.0 - v) * edge_factor);
            frequency_filter(slice, &h)
        }
    };

    Ok(slice.with_data(filtered))
}

fn spatial_low<F: SliceFloat>(slice: &Slice<F>, kernel_size: usize, blend_factor: f64) -> Array2<F> {
    let weight = F::one() / F::usize_as(kernel_size * kernel_size);
    let kernel = Array2::from_elem((kernel_size, kernel_size), weight);
    let mut blurred = convolve2d_symmetric(slice.view(), kernel.view());

    let factor = F::from_f64_c(blend_factor);
    let keep = F::one() - factor;
    blurred.zip_mut_with(slice.data(), |b, &orig| *b = factor * *b + keep * orig);
    blurred
}

/// Multiply the centred spectrum by `h` and transform back.
fn frequency_filter<F: SliceFloat>(slice: &Slice<F>, h: &Array2<f64>) -> Array2<F> {
    let (rows, cols) = slice.dim();
    let plans = FftPlans::new(rows, cols);

    let mut spectrum = fftshift(&plans.forward(slice.view()));
    spectrum.zip_mut_with(h, |s, &gain| *s = *s * F::from_f64_c(gain));

    plans.inverse_real(&ifftshift(&spectrum))
}
