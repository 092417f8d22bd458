//! Criterion benchmarks for the slice engines.
//!
//! Run with: cargo bench
//! Run specific: cargo bench -- filters

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;
use rand::prelude::*;

use slice_core::convolution::convolve2d_symmetric;
use slice_core::{
    filtering, geometry, restoration, EdgeKernel, FftPlans, FilterSpec, FrequencyWindow,
    RestorationMethod, RestorationRequest, Slice, TransformSpec,
};

// =============================================================================
// Test Data Generators
// =============================================================================

/// Smooth phantom-like slice: a bright disc on a dim gradient, plus noise.
fn phantom(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (cy, cx) = (rows as f32 / 2.0, cols as f32 / 2.0);
    let radius = rows.min(cols) as f32 / 3.0;
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let dy = r as f32 - cy;
        let dx = c as f32 - cx;
        let disc = if dx * dx + dy * dy < radius * radius {
            800.0
        } else {
            0.0
        };
        let background = -1000.0 + 200.0 * (r as f32 / rows as f32);
        background + disc + rng.gen::<f32>() * 20.0
    })
}

// =============================================================================
// Transform Benchmarks
// =============================================================================

fn bench_fft2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft2d");

    for size in [128, 512] {
        let input = phantom(size, size, 42);
        let plans = FftPlans::<f32>::new(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));

        group.bench_with_input(
            BenchmarkId::new("roundtrip", format!("{}x{}", size, size)),
            &size,
            |b, _| {
                b.iter(|| {
                    let freq = plans.forward(black_box(input.view()));
                    plans.inverse_real(&freq)
                })
            },
        );
    }

    group.finish();
}

fn bench_convolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution");
    let kernel = EdgeKernel::SobelNE.kernel::<f32>();

    for size in [128, 512] {
        let input = phantom(size, size, 7);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(
            BenchmarkId::new("sobel_3x3", format!("{}x{}", size, size)),
            &size,
            |b, _| b.iter(|| convolve2d_symmetric(black_box(input.view()), kernel.view())),
        );
    }

    group.finish();
}

// =============================================================================
// Engine Benchmarks
// =============================================================================

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");
    let slice = Slice::from_array(phantom(512, 512, 3));

    let specs = [
        (
            "spatial_low_k7",
            FilterSpec::SpatialLow {
                kernel_size: 7,
                blend_factor: 1.0,
            },
        ),
        (
            "frequency_low_gaussian",
            FilterSpec::FrequencyLow {
                window: FrequencyWindow::Gaussian,
                radius: 0.2,
                noise_factor: 1.0,
            },
        ),
        (
            "frequency_high_hanning",
            FilterSpec::FrequencyHigh {
                window: FrequencyWindow::Hanning,
                radius: 0.3,
                edge_factor: 1.0,
            },
        ),
    ];
    for (label, spec) in specs {
        group.bench_function(label, |b| {
            b.iter(|| filtering::apply(black_box(&slice), &spec))
        });
    }

    group.finish();
}

fn bench_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry");
    let slice = Slice::from_array(phantom(256, 256, 5));

    let specs = [
        ("rotate_30", TransformSpec::Rotation { angle_deg: 30.0 }),
        ("scale_1.5", TransformSpec::Scaling { sx: 1.5, sy: 1.5 }),
        (
            "shear_20",
            TransformSpec::Shearing {
                shx_deg: 20.0,
                shy_deg: 0.0,
            },
        ),
    ];
    for (label, spec) in specs {
        group.bench_function(label, |b| {
            b.iter(|| geometry::apply(black_box(&slice), &spec))
        });
    }

    group.finish();
}

fn bench_restoration(c: &mut Criterion) {
    let mut group = c.benchmark_group("restoration");
    group.sample_size(10);

    for size in [64, 128] {
        let slice = Slice::from_array(phantom(size, size, 11));
        for method in [RestorationMethod::Cls, RestorationMethod::Wcls, RestorationMethod::Bmr] {
            let request = RestorationRequest::new().with_method(method).with_seed(1);
            group.bench_with_input(
                BenchmarkId::new(method.name(), format!("{}x{}", size, size)),
                &size,
                |b, _| b.iter(|| restoration::restore(black_box(&slice), &request)),
            );
        }
    }

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(
    benches,
    bench_fft2d,
    bench_convolution,
    bench_filters,
    bench_geometry,
    bench_restoration,
);

criterion_main!(benches);
