//! Per-orientation dispatch.
//!
//! A viewer shows the same operation on the axial, sagittal and coronal slice
//! of a volume. The three calls are independent, so they run in parallel and
//! the caller waits for all three.
//!
//! [`evaluate_restoration`] reproduces the viewer's restoration panel: each
//! method in turn degrades and restores all three slices and scores the
//! results against the originals.

use std::fmt;

use log::debug;
use rayon::prelude::*;

use crate::error::Result;
use crate::float_trait::SliceFloat;
use crate::metrics::{metrics, QualityMetrics};
use crate::restoration::{restore, RestorationMethod, RestorationRequest, RestorationResult};
use crate::slice::Slice;

/// Methods the viewer evaluates side by side.
pub const VIEWER_METHODS: [RestorationMethod; 3] = [
    RestorationMethod::Cls,
    RestorationMethod::Wcls,
    RestorationMethod::Bmr,
];

/// Golden-ratio increment used to spread derived noise seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Sagittal,
    Coronal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Sagittal,
        Orientation::Coronal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Axial => "axial",
            Orientation::Sagittal => "sagittal",
            Orientation::Coronal => "coronal",
        }
    }

    fn index(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Sagittal => 1,
            Orientation::Coronal => 2,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationSet<T> {
    pub axial: T,
    pub sagittal: T,
    pub coronal: T,
}

impl<T> OrientationSet<T> {
    pub fn new(axial: T, sagittal: T, coronal: T) -> Self {
        Self {
            axial,
            sagittal,
            coronal,
        }
    }

    pub fn get(&self, orientation: Orientation) -> &T {
        match orientation {
            Orientation::Axial => &self.axial,
            Orientation::Sagittal => &self.sagittal,
            Orientation::Coronal => &self.coronal,
        }
    }

    /// Axial, sagittal, coronal, in that order.
    pub fn iter(&self) -> impl Iterator<Item = (Orientation, &T)> {
        Orientation::ALL.into_iter().map(move |o| (o, self.get(o)))
    }

    pub fn map<U, G>(&self, mut f: G) -> OrientationSet<U>
    where
        G: FnMut(Orientation, &T) -> U,
    {
        OrientationSet {
            axial: f(Orientation::Axial, &self.axial),
            sagittal: f(Orientation::Sagittal, &self.sagittal),
            coronal: f(Orientation::Coronal, &self.coronal),
        }
    }

    /// Run `f` on all three orientations concurrently and wait for all of
    /// them. If several fail, the error of the earliest orientation is
    /// returned.
    pub fn try_map_parallel<U, E, G>(&self, f: G) -> std::result::Result<OrientationSet<U>, E>
    where
        T: Sync,
        U: Send,
        E: Send,
        G: Fn(Orientation, &T) -> std::result::Result<U, E> + Sync,
    {
        let (axial, (sagittal, coronal)) = rayon::join(
            || f(Orientation::Axial, &self.axial),
            || {
                rayon::join(
                    || f(Orientation::Sagittal, &self.sagittal),
                    || f(Orientation::Coronal, &self.coronal),
                )
            },
        );
        Ok(OrientationSet {
            axial: axial?,
            sagittal: sagittal?,
            coronal: coronal?,
        })
    }
}

/// Restoration output and scores for one method across all orientations.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodReport<F: SliceFloat> {
    pub method: RestorationMethod,
    pub results: OrientationSet<RestorationResult<F>>,
    /// Restored slice against the original.
    pub restored_metrics: OrientationSet<QualityMetrics>,
    /// Degraded observation against the original.
    pub degraded_metrics: OrientationSet<QualityMetrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestorationReport<F: SliceFloat> {
    /// In the order the methods were requested.
    pub methods: Vec<MethodReport<F>>,
}

impl<F: SliceFloat> RestorationReport<F> {
    pub fn get(&self, method: RestorationMethod) -> Option<&MethodReport<F>> {
        self.methods.iter().find(|r| r.method == method)
    }
}

/// Seed for one (method, orientation) run, derived from the request seed.
fn derived_seed(base: u64, method: RestorationMethod, orientation: Orientation) -> u64 {
    let slot = (method as u64) * Orientation::ALL.len() as u64 + orientation.index() as u64 + 1;
    base.wrapping_add(SEED_STRIDE.wrapping_mul(slot))
}

/// Score one output of every orientation against its original.
fn score<F: SliceFloat>(
    originals: &OrientationSet<Slice<F>>,
    results: &OrientationSet<RestorationResult<F>>,
    pick: fn(&RestorationResult<F>) -> &Slice<F>,
) -> Result<OrientationSet<QualityMetrics>> {
    originals.try_map_parallel(|orientation, original| {
        metrics(original.view(), pick(results.get(orientation)).view())
    })
}

/// Degrade, restore and score every slice with every method.
///
/// `request.method` is overridden per entry of `methods`. With a seed set,
/// each (method, orientation) run gets its own deterministic derived seed.
pub fn evaluate_restoration<F: SliceFloat>(
    slices: &OrientationSet<Slice<F>>,
    request: &RestorationRequest,
    methods: &[RestorationMethod],
) -> Result<RestorationReport<F>> {
    request.validate()?;
    debug!("evaluating {} restoration methods on 3 orientations", methods.len());

    let reports = methods
        .par_iter()
        .map(|&method| -> Result<MethodReport<F>> {
            let results = slices.try_map_parallel(|orientation, slice| {
                let mut run = request.with_method(method);
                run.seed = request
                    .seed
                    .map(|base| derived_seed(base, method, orientation));
                restore(slice, &run)
            })?;

            let restored_metrics = score(slices, &results, |r| &r.restored)?;
            let degraded_metrics = score(slices, &results, |r| &r.degraded)?;

            Ok(MethodReport {
                method,
                results,
                restored_metrics,
                degraded_metrics,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RestorationReport { methods: reports })
}
