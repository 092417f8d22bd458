//! Slice data model.
//!
//! A [`Slice`] is one 2D cross-section of a volume together with the
//! volume-wide intensity range. The range minimum is the fill value for every
//! pixel a transform produces without a source, so downstream windowing never
//! sees spurious zeros.

use ndarray::{Array2, ArrayView2};

use crate::float_trait::SliceFloat;

/// Volume-wide `(min, max)` border pair, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRange<F: SliceFloat> {
    pub min: F,
    pub max: F,
}

impl<F: SliceFloat> VolumeRange<F> {
    pub fn new(min: F, max: F) -> Self {
        Self { min, max }
    }

    /// Scan samples (typically the whole volume) for their range.
    /// An empty iterator yields `(0, 0)`.
    pub fn of<I>(values: I) -> Self
    where
        I: IntoIterator<Item = F>,
    {
        let (min, max) = values.into_iter().fold(
            (F::infinity(), F::neg_infinity()),
            |(lo, hi), v| (if v < lo { v } else { lo }, if v > hi { v } else { hi }),
        );
        if min > max {
            Self::new(F::zero(), F::zero())
        } else {
            Self::new(min, max)
        }
    }
}

/// A single 2D slice plus the border pair of the volume it came from.
///
/// Slices are immutable; every engine returns a freshly allocated one.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<F: SliceFloat> {
    data: Array2<F>,
    range: VolumeRange<F>,
}

impl<F: SliceFloat> Slice<F> {
    pub fn new(data: Array2<F>, range: VolumeRange<F>) -> Self {
        Self { data, range }
    }

    /// Build a slice whose border pair is taken from its own samples.
    pub fn from_array(data: Array2<F>) -> Self {
        let range = VolumeRange::of(data.iter().copied());
        Self { data, range }
    }

    /// Same border pair, new pixels.
    pub fn with_data(&self, data: Array2<F>) -> Self {
        Self {
            data,
            range: self.range,
        }
    }

    #[inline]
    pub fn data(&self) -> &Array2<F> {
        &self.data
    }

    #[inline]
    pub fn view(&self) -> ArrayView2<'_, F> {
        self.data.view()
    }

    #[inline]
    pub fn range(&self) -> VolumeRange<F> {
        self.range
    }

    /// Value written to every destination pixel with no source mapping.
    #[inline]
    pub fn fill_value(&self) -> F {
        self.range.min
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Array2<F> {
        self.data
    }
}

/// Minimum and maximum of an image. Empty views return `(0, 0)`.
pub fn min_max<F: SliceFloat>(view: ArrayView2<F>) -> (F, F) {
    let range = VolumeRange::of(view.iter().copied());
    (range.min, range.max)
}

/// Min–max normalize to `[0, 1]`.
///
/// A flat image (`max == min`) is returned unchanged rather than divided by zero.
pub fn normalize_unit<F: SliceFloat>(view: ArrayView2<F>) -> Array2<F> {
    let (lo, hi) = min_max(view);
    let span = hi - lo;
    if span == F::zero() {
        return view.to_owned();
    }
    view.mapv(|v| (v - lo) / span)
}
