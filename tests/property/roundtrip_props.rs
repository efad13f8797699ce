//! Round-trip properties over randomly generated histories.
//!
//! Each case stages a random DAG (parents always precede children), with
//! parent counts spanning 0, 1, 2, and octopus merges, and a random
//! subset of commits carrying filters, then encodes and decodes it and
//! checks field-for-field identity.

use commitgraph::{
    encode_to_vec, CommitData, CommitGraph, FileGraph, MemoryGraph, Oid, PathFilter,
    COMMIT_TIME_MASK,
};
use proptest::prelude::*;
use proptest::sample::Index;

const PROPTEST_CASES: u32 = 96;

fn proptest_config() -> ProptestConfig {
    ProptestConfig::with_cases(PROPTEST_CASES)
}

/// Raw generator output for one commit.
#[derive(Clone, Debug)]
struct CommitCase {
    first_byte: u8,
    parent_picks: Vec<Index>,
    time: u64,
    filter_paths: Option<Vec<Vec<u8>>>,
}

fn commit_case() -> impl Strategy<Value = CommitCase> {
    (
        any::<u8>(),
        proptest::collection::vec(any::<Index>(), 0..=5),
        any::<u64>(),
        proptest::option::of(proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..16),
            0..4,
        )),
    )
        .prop_map(|(first_byte, parent_picks, time, filter_paths)| CommitCase {
            first_byte,
            parent_picks,
            time,
            filter_paths,
        })
}

/// Unique oid per commit index; the first byte is free so the fanout
/// gets exercised across buckets.
fn nth_oid(first_byte: u8, index: usize) -> Oid {
    let mut bytes = [0u8; 20];
    bytes[0] = first_byte;
    bytes[1..5].copy_from_slice(&(index as u32).to_be_bytes());
    Oid::new(bytes)
}

struct StagedCommit {
    oid: Oid,
    tree: Oid,
    parents: Vec<Oid>,
    generation: u32,
    time: u64,
    filter: Option<PathFilter>,
}

/// Resolves generator output into a valid parent-before-child history.
fn stage(cases: &[CommitCase]) -> Vec<StagedCommit> {
    let mut staged: Vec<StagedCommit> = Vec::with_capacity(cases.len());

    for (i, case) in cases.iter().enumerate() {
        let oid = nth_oid(case.first_byte, i);
        let tree = nth_oid(case.first_byte ^ 0xff, i + cases.len());

        // Parents are picked among earlier commits, deduplicated while
        // keeping pick order.
        let mut parents: Vec<Oid> = Vec::new();
        if i > 0 {
            for pick in &case.parent_picks {
                let parent = staged[pick.index(i)].oid;
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }

        let generation = parents
            .iter()
            .map(|p| {
                staged
                    .iter()
                    .find(|c| c.oid == *p)
                    .map(|c| c.generation)
                    .unwrap_or(0)
            })
            .max()
            .unwrap_or(0)
            + 1;

        let filter = case.filter_paths.as_ref().map(|paths| {
            let mut filter = PathFilter::new();
            for path in paths {
                filter.add(path);
            }
            filter
        });

        staged.push(StagedCommit {
            oid,
            tree,
            parents,
            generation,
            time: case.time,
            filter,
        });
    }

    staged
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn encode_decode_identity(cases in proptest::collection::vec(commit_case(), 0..40)) {
        let staged = stage(&cases);

        let mut graph = MemoryGraph::new();
        for commit in &staged {
            graph
                .add_with_filter(
                    commit.oid,
                    CommitData {
                        tree: commit.tree,
                        parent_oids: commit.parents.clone(),
                        parent_positions: Vec::new(),
                        generation: commit.generation,
                        commit_time: commit.time,
                    },
                    commit.filter.clone(),
                )
                .unwrap();
        }

        let bytes = encode_to_vec(&graph).unwrap();
        let decoded = FileGraph::open(&bytes[..]).unwrap();

        prop_assert_eq!(decoded.num_commits(), staged.len() as u32);

        for commit in &staged {
            let pos = decoded.lookup(&commit.oid).unwrap();
            let record = decoded.commit_data(pos).unwrap();

            prop_assert_eq!(record.tree, commit.tree);
            prop_assert_eq!(&record.parent_oids, &commit.parents);
            prop_assert_eq!(record.generation, commit.generation);
            prop_assert_eq!(record.commit_time, commit.time & COMMIT_TIME_MASK);

            match &commit.filter {
                Some(filter) => prop_assert_eq!(&decoded.path_filter(pos).unwrap(), filter),
                None => prop_assert!(decoded.path_filter(pos).unwrap_err().is_not_found()),
            }
        }
    }

    #[test]
    fn fanout_matches_first_byte_census(cases in proptest::collection::vec(commit_case(), 0..40)) {
        let staged = stage(&cases);

        let mut graph = MemoryGraph::new();
        for commit in &staged {
            graph
                .add(
                    commit.oid,
                    CommitData {
                        tree: commit.tree,
                        parent_oids: commit.parents.clone(),
                        parent_positions: Vec::new(),
                        generation: commit.generation,
                        commit_time: commit.time,
                    },
                )
                .unwrap();
        }

        let bytes = encode_to_vec(&graph).unwrap();
        let decoded = FileGraph::open(&bytes[..]).unwrap();

        for bucket in 0..=255u8 {
            let expected = staged
                .iter()
                .filter(|c| c.oid.first_byte() <= bucket)
                .count() as u32;
            prop_assert_eq!(decoded.fanout(bucket), expected);
        }

        // Every hash enumerates back out, sorted ascending.
        let mut expected: Vec<Oid> = staged.iter().map(|c| c.oid).collect();
        expected.sort_unstable();
        prop_assert_eq!(decoded.oids().unwrap(), expected);
    }
}
