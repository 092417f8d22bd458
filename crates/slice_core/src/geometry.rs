//! Geometric Transform Engine.
//!
//! Rotation, translation, scaling and shearing by explicit forward point
//! mapping: every source pixel is pushed through a linear map into an output
//! canvas sized to hold all four projected corners, so nothing is clipped.
//! Destination cells that no source pixel reaches keep the volume fill value.
//!
//! ## Conventions
//!
//! - Coordinates are `(y, x)` = `(row, column)`.
//! - Positive rotation angles turn the image clockwise.
//! - Translation keeps the canvas size; vacated cells are filled.
//! - Scaling runs a 3×3 neighbourhood hole-fill pass after mapping.
//!   Negative factors mirror about the pixel centres.

use log::debug;
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use ndarray::{s, Array2};
use std::ops::Range;

use crate::error::{EngineError, Result};
use crate::float_trait::SliceFloat;
use crate::slice::Slice;

// =============================================================================
// Types
// =============================================================================

/// One geometric transform. Exactly one variant is active per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformSpec {
    /// Rotation about the origin, clockwise-positive, in degrees.
    Rotation { angle_deg: f64 },
    /// Integer shift: `dx` columns, `dy` rows.
    Translation { dx: isize, dy: isize },
    /// Axis scale factors (`sx` columns, `sy` rows). Negative factors mirror.
    Scaling { sx: f64, sy: f64 },
    /// Shear angles in degrees. `shx_deg` shifts columns by rows,
    /// `shy_deg` shifts rows by columns.
    Shearing { shx_deg: f64, shy_deg: f64 },
}

impl TransformSpec {
    /// Check that the parameters describe a finite, invertible map.
    pub fn validate(&self) -> Result<()> {
        match *self {
            TransformSpec::Rotation { angle_deg } => ensure_finite("angle_deg", angle_deg),
            TransformSpec::Translation { .. } => Ok(()),
            TransformSpec::Scaling { sx, sy } => {
                for (name, factor) in [("sx", sx), ("sy", sy)] {
                    ensure_finite(name, factor)?;
                    if factor == 0.0 {
                        return Err(EngineError::invalid(name, "scale factor must be non-zero"));
                    }
                }
                Ok(())
            }
            TransformSpec::Shearing { shx_deg, shy_deg } => {
                for (name, angle) in [("shx_deg", shx_deg), ("shy_deg", shy_deg)] {
                    ensure_finite(name, angle)?;
                    if angle.abs() >= 90.0 {
                        return Err(EngineError::invalid(
                            name,
                            format!("shear angle must lie in (-90, 90), got {angle}"),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

fn ensure_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid(name, format!("must be finite, got {value}")))
    }
}

/// How projected coordinates are shifted to non-negative indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// Offset by exactly `-min`.
    Exact,
    /// Offset by `-floor(min)`, an integer shift.
    Floor,
    /// Offset by `-min` over the projected first and last pixel indices,
    /// so a mirrored axis starts at index 0.
    Centres,
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Apply one geometric transform, returning a new slice with the same border pair.
pub fn apply<F: SliceFloat>(slice: &Slice<F>, spec: &TransformSpec) -> Result<Slice<F>> {
    spec.validate()?;
    debug!("geometric transform {:?} on {:?} slice", spec, slice.dim());

    if slice.is_empty() {
        return Ok(slice.clone());
    }

    let output = match *spec {
        TransformSpec::Rotation { angle_deg } => rotate(slice, angle_deg),
        TransformSpec::Translation { dx, dy } => translate(slice, dx, dy),
        TransformSpec::Scaling { sx, sy } => scale(slice, sx, sy),
        TransformSpec::Shearing { shx_deg, shy_deg } => shear(slice, shx_deg, shy_deg),
    };
    Ok(output)
}

// =============================================================================
// Transforms
// =============================================================================

fn rotate<F: SliceFloat>(slice: &Slice<F>, angle_deg: f64) -> Slice<F> {
    let angle = -angle_deg.to_radians();
    let (sin, cos) = angle.sin_cos();
    let rotation = Matrix2::new(cos, -sin, sin, cos);

    forward_map(slice, Anchor::Exact, |y, x| {
        let p = rotation * Vector2::new(y, x);
        (p.x, p.y)
    })
}

fn translate<F: SliceFloat>(slice: &Slice<F>, dx: isize, dy: isize) -> Slice<F> {
    let (rows, cols) = slice.dim();
    let mut output = Array2::from_elem((rows, cols), slice.fill_value());

    if let (Some((src_r, dst_r)), Some((src_c, dst_c))) =
        (shifted_span(rows, dy), shifted_span(cols, dx))
    {
        output
            .slice_mut(s![dst_r, dst_c])
            .assign(&slice.data().slice(s![src_r, src_c]));
    }

    slice.with_data(output)
}

/// Source and destination index ranges of a 1D integer shift, or `None`
/// when everything moves out of bounds.
fn shifted_span(len: usize, shift: isize) -> Option<(Range<usize>, Range<usize>)> {
    let magnitude = shift.unsigned_abs();
    if magnitude >= len {
        return None;
    }
    if shift >= 0 {
        Some((0..len - magnitude, magnitude..len))
    } else {
        Some((magnitude..len, 0..len - magnitude))
    }
}

fn scale<F: SliceFloat>(slice: &Slice<F>, sx: f64, sy: f64) -> Slice<F> {
    let scaling = Matrix2::new(sy, 0.0, 0.0, sx);
    let mapped = forward_map(slice, Anchor::Centres, |y, x| {
        let p = scaling * Vector2::new(y, x);
        (p.x, p.y)
    });

    let fill = slice.fill_value();
    let mut data = mapped.into_data();
    fill_holes(&mut data, fill);
    slice.with_data(data)
}

fn shear<F: SliceFloat>(slice: &Slice<F>, shx_deg: f64, shy_deg: f64) -> Slice<F> {
    let shy = shy_deg.to_radians().tan();
    let shx = shx_deg.to_radians().tan();
    #[rustfmt::skip]
    let projection = Matrix3::new(
        1.0, shy, 0.0,
        shx, 1.0, 0.0,
        0.0, 0.0, 1.0,
    );

    forward_map(slice, Anchor::Floor, |y, x| {
        let p = projection * Vector3::new(y, x, 1.0);
        (p.x, p.y)
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Push every source pixel through `map` into a canvas that holds the
/// projected image corners.
fn forward_map<F, M>(slice: &Slice<F>, anchor: Anchor, map: M) -> Slice<F>
where
    F: SliceFloat,
    M: Fn(f64, f64) -> (f64, f64),
{
    let (rows, cols) = slice.dim();
    let (h, w) = (rows as f64, cols as f64);

    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (y, x) in [(0.0, 0.0), (0.0, w), (h, 0.0), (h, w)] {
        let (py, px) = map(y, x);
        min = (min.0.min(py), min.1.min(px));
        max = (max.0.max(py), max.1.max(px));
    }

    let out_rows = (max.0 - min.0).ceil().max(0.0) as usize;
    let out_cols = (max.1 - min.1).ceil().max(0.0) as usize;
    let (offset_y, offset_x) = match anchor {
        Anchor::Exact => (-min.0, -min.1),
        Anchor::Floor => (-min.0.floor(), -min.1.floor()),
        Anchor::Centres => {
            let (last_y, last_x) = (h - 1.0, w - 1.0);
            let mut lo = (f64::INFINITY, f64::INFINITY);
            for (y, x) in [(0.0, 0.0), (0.0, last_x), (last_y, 0.0), (last_y, last_x)] {
                let (py, px) = map(y, x);
                lo = (lo.0.min(py), lo.1.min(px));
            }
            (-lo.0, -lo.1)
        }
    };

    let mut output = Array2::from_elem((out_rows, out_cols), slice.fill_value());
    for ((y, x), &value) in slice.data().indexed_iter() {
        let (py, px) = map(y as f64, x as f64);
        let ty = (py + offset_y).round_ties_even();
        let tx = (px + offset_x).round_ties_even();
        if ty >= 0.0 && tx >= 0.0 && (ty as usize) < out_rows && (tx as usize) < out_cols {
            output[[ty as usize, tx as usize]] = value;
        }
    }

    slice.with_data(output)
}

/// Replace each cell still equal to `sentinel` by the mean of its
/// non-sentinel 8-neighbours, in raster order and in place.
fn fill_holes<F: SliceFloat>(image: &mut Array2<F>, sentinel: F) {
    let (rows, cols) = image.dim();
    for y in 0..rows {
        for x in 0..cols {
            if image[[y, x]] != sentinel {
                continue;
            }
            let mut sum = F::zero();
            let mut count = 0usize;
            for ny in y.saturating_sub(1)..(y + 2).min(rows) {
                for nx in x.saturating_sub(1)..(x + 2).min(cols) {
                    let v = image[[ny, nx]];
                    if v != sentinel {
                        sum += v;
                        count += 1;
                    }
                }
            }
            if count > 0 {
                image[[y, x]] = sum / F::usize_as(count);
            }
        }
    }
}
