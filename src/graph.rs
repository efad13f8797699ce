//! Per-commit records and the graph read contract.
//!
//! Every backing (the chunked file reader and the in-memory staging
//! buffer) satisfies the same five-operation [`CommitGraph`] contract, so
//! traversal code and the encoder are indifferent to where records come
//! from.
//!
//! # Invariants
//! - Positions are dense integers `[0, N)`; a file-backed graph assigns
//!   them in ascending hash order.
//! - `generation` is `1 + max(parent generations)`, or 1 for a root.
//! - `parent_oids` and `parent_positions` are parallel and ordered;
//!   positions resolve only against ids already assigned in the same
//!   graph.

use crate::errors::GraphError;
use crate::filter::PathFilter;
use crate::oid::Oid;

/// Dense id of a commit within one graph.
///
/// Row position in the sorted hash table for file-backed graphs,
/// insertion order for the in-memory builder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position(pub u32);

/// Largest generation number the packed on-disk field can carry (30 bits).
///
/// The encoder clamps larger values, the same cap git applies.
pub const GENERATION_MAX: u32 = (1 << 30) - 1;

/// Mask for the 34-bit commit-time portion of the packed field.
pub const COMMIT_TIME_MASK: u64 = (1 << 34) - 1;

/// Decoded per-commit record.
///
/// Immutable once constructed. `commit_time` survives a round-trip only in
/// its low 34 bits; see [`COMMIT_TIME_MASK`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitData {
    /// Root tree of the commit.
    pub tree: Oid,
    /// Parent hashes in commit order.
    pub parent_oids: Vec<Oid>,
    /// Parent positions, parallel to `parent_oids`.
    pub parent_positions: Vec<Position>,
    /// Topological height: `1 + max(parent generations)`, 1 for roots.
    pub generation: u32,
    /// Committer time in seconds since the Unix epoch.
    pub commit_time: u64,
}

impl CommitData {
    /// Returns the number of parents.
    #[inline]
    #[must_use]
    pub fn num_parents(&self) -> usize {
        self.parent_oids.len()
    }
}

/// Read contract shared by every graph backing.
///
/// All misses (unknown hash, position out of bounds, absent filter)
/// surface as [`GraphError::NotFound`] so callers can fall back to a full
/// object store with a single check.
pub trait CommitGraph {
    /// Total commits in the graph.
    fn num_commits(&self) -> u32;

    /// Looks up a commit hash, returning its position.
    fn lookup(&self, oid: &Oid) -> Result<Position, GraphError>;

    /// Fetches the decoded record for a position.
    fn commit_data(&self, pos: Position) -> Result<CommitData, GraphError>;

    /// Enumerates all commit hashes, in position order.
    fn oids(&self) -> Result<Vec<Oid>, GraphError>;

    /// Fetches the changed-paths filter for a position, if one is stored.
    fn path_filter(&self, pos: Position) -> Result<PathFilter, GraphError>;
}
