mod proptest_helpers;

use labelkit::geometry::{
    diagonal_to_orthogonal_path, is_clockwise, normalize_clockwise, polygon_area,
    remove_duplicate_adjacent_points, reverse_ring,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn reversal_flips_winding_and_keeps_area(ring in proptest_helpers::arb_ring()) {
        let area = polygon_area(&ring);
        prop_assume!(area > 0.0);

        let reversed = reverse_ring(&ring);
        prop_assert_eq!(polygon_area(&reversed), area);
        prop_assert_ne!(is_clockwise(&reversed), is_clockwise(&ring));
        prop_assert_eq!(reverse_ring(&reversed), ring);
    }

    #[test]
    fn normalize_clockwise_is_idempotent(ring in proptest_helpers::arb_ring()) {
        prop_assume!(polygon_area(&ring) > 0.0);

        let once = normalize_clockwise(&ring);
        prop_assert!(is_clockwise(&once));
        prop_assert_eq!(normalize_clockwise(&once), once);
    }

    #[test]
    fn orthogonal_path_only_takes_axis_aligned_steps(ring in proptest_helpers::arb_ring()) {
        let path = diagonal_to_orthogonal_path(&ring);

        for step in path.chunks_exact(2).collect::<Vec<_>>().windows(2) {
            let (a, b) = (step[0], step[1]);
            prop_assert!(a[0] == b[0] || a[1] == b[1], "diagonal step {:?} -> {:?}", a, b);
        }
        prop_assert_eq!(path[0], ring[0] as i64);
        prop_assert_eq!(path[1], ring[1] as i64);
        prop_assert_eq!(path[path.len() - 2], ring[ring.len() - 2] as i64);
        prop_assert_eq!(path[path.len() - 1], ring[ring.len() - 1] as i64);

        let as_floats: Vec<f64> = path.iter().map(|&v| v as f64).collect();
        prop_assert_eq!(diagonal_to_orthogonal_path(&as_floats), path);
    }

    #[test]
    fn deduplication_leaves_no_repeats_or_backtracks(
        points in prop::collection::vec(0i64..4, 0..40)
    ) {
        let kept = remove_duplicate_adjacent_points(&points);
        let pairs: Vec<&[i64]> = kept.chunks_exact(2).collect();

        for window in pairs.windows(2) {
            prop_assert_ne!(window[0], window[1]);
        }
        for window in pairs.windows(3) {
            prop_assert_ne!(window[0], window[2]);
        }
    }
}
