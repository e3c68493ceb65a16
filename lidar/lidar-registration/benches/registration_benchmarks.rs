//! Benchmarks for lidar-registration operations.
//!
//! Run with: cargo bench -p lidar-registration
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p lidar-registration -- --save-baseline main
//! 2. After changes: cargo bench -p lidar-registration -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lidar_registration::{
    FilterParams, IcpParams, SearchMethod, filter_cloud, filter_cloud_parallel, icp_align,
};
use lidar_types::{PointCloud, RigidTransform};
use nalgebra::{Point3, Vector3};
use rand::{Rng, SeedableRng};

// =============================================================================
// Test Cloud Generation
// =============================================================================

fn simulated_scan(count: usize, seed: u64) -> PointCloud {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Point3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            )
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let params = FilterParams::default();

    for count in [10_000_usize, 100_000] {
        let cloud = simulated_scan(count, 1);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), &cloud, |b, cloud| {
            b.iter(|| filter_cloud(black_box(cloud), &params));
        });
        group.bench_with_input(BenchmarkId::new("parallel", count), &cloud, |b, cloud| {
            b.iter(|| filter_cloud_parallel(black_box(cloud), &params));
        });
    }

    group.finish();
}

fn bench_icp(c: &mut Criterion) {
    let mut group = c.benchmark_group("icp");
    group.sample_size(20);

    for count in [1_000_usize, 5_000] {
        let reference = simulated_scan(count, 2);
        let raw = RigidTransform::from_translation(Vector3::new(0.05, 0.0, 0.0))
            .transform_cloud(&reference);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("kdtree", count), &raw, |b, raw| {
            b.iter(|| icp_align(black_box(raw), &reference, &IcpParams::default()));
        });
        if count <= 1_000 {
            let params = IcpParams::new().with_search(SearchMethod::BruteForce);
            group.bench_with_input(BenchmarkId::new("brute_force", count), &raw, |b, raw| {
                b.iter(|| icp_align(black_box(raw), &reference, &params));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_filter, bench_icp);
criterion_main!(benches);
