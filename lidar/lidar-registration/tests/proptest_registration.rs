//! Property-based tests for filtering and neighbor search.
//!
//! Run with: cargo test -p lidar-registration -- proptest

use lidar_registration::{
    FilterParams, NeighborSearch, SearchMethod, TargetIndex, filter_cloud,
    filter_cloud_parallel,
};
use lidar_types::PointCloud;
use nalgebra::Point3;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-2.0..2.0f64).prop_map(Point3::from)
}

fn arb_cloud(max_points: usize) -> impl Strategy<Value = PointCloud> {
    prop::collection::vec(arb_point(), 0..max_points).prop_map(PointCloud::from_points)
}

/// A cloud together with a permutation of its indices.
fn arb_cloud_and_permutation(max_points: usize) -> impl Strategy<Value = (PointCloud, Vec<usize>)> {
    arb_cloud(max_points).prop_flat_map(|cloud| {
        let indices: Vec<usize> = (0..cloud.len()).collect();
        (Just(cloud), Just(indices).prop_shuffle())
    })
}

fn permute(cloud: &PointCloud, order: &[usize]) -> PointCloud {
    order.iter().map(|&i| cloud.points[i]).collect()
}

fn sorted_bits(cloud: &PointCloud) -> Vec<[u64; 3]> {
    let mut v: Vec<[u64; 3]> = cloud
        .iter()
        .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
        .collect();
    v.sort_unstable();
    v
}

// =============================================================================
// Property Tests: Filter
// =============================================================================

proptest! {
    /// Filtering commutes with permutation as a multiset.
    #[test]
    fn filter_is_order_invariant(
        (cloud, order) in arb_cloud_and_permutation(64),
        min_distance in 0.0..2.0f64,
    ) {
        let params = FilterParams::new().with_min_distance(min_distance);
        let filter_then_permute = filter_cloud(&cloud, &params);
        let permute_then_filter = filter_cloud(&permute(&cloud, &order), &params);
        prop_assert_eq!(sorted_bits(&filter_then_permute), sorted_bits(&permute_then_filter));
    }

    /// The parallel path is indistinguishable from the reference path.
    #[test]
    fn parallel_filter_matches_reference(cloud in arb_cloud(256), min_distance in 0.0..2.0f64) {
        let params = FilterParams::new().with_min_distance(min_distance);
        prop_assert_eq!(filter_cloud(&cloud, &params), filter_cloud_parallel(&cloud, &params));
    }

    /// Every surviving point is beyond the threshold, every dropped one is not.
    #[test]
    fn filter_respects_threshold(cloud in arb_cloud(64), min_distance in 0.0..2.0f64) {
        let params = FilterParams::new().with_min_distance(min_distance);
        let kept = filter_cloud(&cloud, &params);
        for p in &kept {
            prop_assert!(p.coords.norm() > min_distance);
        }
        let expected = cloud.iter().filter(|p| p.coords.norm() > min_distance).count();
        prop_assert_eq!(kept.len(), expected);
    }
}

// =============================================================================
// Property Tests: Neighbor Search
// =============================================================================

proptest! {
    /// KD-tree and exhaustive search agree on the nearest distance.
    #[test]
    fn kdtree_matches_brute_force(
        targets in prop::collection::vec(arb_point(), 1..24),
        queries in prop::collection::vec(arb_point(), 1..16),
    ) {
        let tree = TargetIndex::build(&targets, SearchMethod::KdTree);
        let brute = TargetIndex::build(&targets, SearchMethod::BruteForce);
        for q in &queries {
            let a = tree.nearest(q);
            let b = brute.nearest(q);
            prop_assert!(a.is_some() && b.is_some());
            if let (Some(a), Some(b)) = (a, b) {
                prop_assert!((a.distance_sq - b.distance_sq).abs() < 1e-12);
            }
        }
    }
}
