//! Slice Core Library
//!
//! Pure, stateless processing of single 2D slices cut from a medical volume:
//! geometric transforms, resolution changes, spatial and frequency filtering,
//! and simulated degradation with regularized restoration plus quality
//! metrics. Every engine takes a [`Slice`] and a parameter value and returns a
//! freshly allocated result; no engine holds state between calls.

pub mod convolution;
pub mod error;
pub mod filtering;
pub mod float_trait;
pub mod geometry;
pub mod metrics;
pub mod orchestration;
pub mod resolution;
pub mod restoration;
pub mod slice;
pub mod toeplitz;
pub mod transforms;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use error::{EngineError, Result};
pub use filtering::{EdgeKernel, FilterSpec, FrequencyWindow};
pub use float_trait::SliceFloat;
pub use geometry::TransformSpec;
pub use metrics::{metrics, MetricsConfig, QualityMetrics};
pub use orchestration::{evaluate_restoration, Orientation, OrientationSet, RestorationReport};
pub use resolution::{MotionAxis, ResolutionSpec, SamplingMode};
pub use restoration::{restore, RestorationMethod, RestorationRequest, RestorationResult};
pub use slice::{Slice, VolumeRange};
pub use transforms::FftPlans;
