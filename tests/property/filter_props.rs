//! Property tests for the changed-paths filter.

use commitgraph::PathFilter;
use proptest::prelude::*;

const PROPTEST_CASES: u32 = 256;

fn proptest_config() -> ProptestConfig {
    ProptestConfig::with_cases(PROPTEST_CASES)
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn no_false_negatives(paths in proptest::collection::vec(
        proptest::collection::vec(any::<u8>(), 0..32),
        0..64,
    )) {
        let mut filter = PathFilter::new();
        for path in &paths {
            filter.add(path);
        }
        for path in &paths {
            prop_assert!(filter.test(path));
        }
    }

    #[test]
    fn raw_bytes_round_trip_preserves_answers(
        added in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..24), 0..32),
        probed in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..24), 0..32),
    ) {
        let mut filter = PathFilter::new();
        for path in &added {
            filter.add(path);
        }

        let copy = PathFilter::from_bytes(*filter.data());
        for path in added.iter().chain(probed.iter()) {
            prop_assert_eq!(filter.test(path), copy.test(path));
        }
    }
}
