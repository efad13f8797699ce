//! In-memory commit graph used as a staging buffer before encoding.
//!
//! `MemoryGraph` is append-only: a maintenance pass feeds it commits in
//! parent-before-child order, then hands it to [`crate::encode`] and drops
//! it. It satisfies the same [`CommitGraph`] contract as the file reader,
//! backed by direct lookups instead of byte decoding.
//!
//! # Invariants
//! - Positions are assigned densely in insertion order.
//! - Every parent of an added commit must already be present; a missing
//!   parent is the uniform `NotFound` error, which enforces the
//!   parent-before-child insertion order.
//! - Single-writer: concurrent `add` calls are not supported and must be
//!   serialized by the caller.

use std::collections::HashMap;

use crate::errors::GraphError;
use crate::filter::PathFilter;
use crate::graph::{CommitData, CommitGraph, Position};
use crate::oid::Oid;

/// Append-only in-memory commit graph.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    oids: Vec<Oid>,
    commits: Vec<CommitData>,
    filters: Vec<Option<PathFilter>>,
    positions: HashMap<Oid, u32>,
}

impl MemoryGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with capacity for `n` commits.
    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self {
            oids: Vec::with_capacity(n),
            commits: Vec::with_capacity(n),
            filters: Vec::with_capacity(n),
            positions: HashMap::with_capacity(n),
        }
    }

    /// Appends a commit without a changed-paths filter.
    ///
    /// See [`MemoryGraph::add_with_filter`].
    pub fn add(&mut self, oid: Oid, data: CommitData) -> Result<Position, GraphError> {
        self.add_with_filter(oid, data, None)
    }

    /// Appends a commit, assigning it the next dense position.
    ///
    /// `data.parent_positions` is ignored on input: positions are resolved
    /// here from `data.parent_oids` against already-added entries.
    ///
    /// # Errors
    /// - `NotFound` if any parent hash has not been added yet.
    /// - `DuplicateCommit` if `oid` is already present; a staging buffer
    ///   fed the same commit twice is a caller bug, not a shadowing
    ///   update.
    pub fn add_with_filter(
        &mut self,
        oid: Oid,
        mut data: CommitData,
        filter: Option<PathFilter>,
    ) -> Result<Position, GraphError> {
        if self.positions.contains_key(&oid) {
            return Err(GraphError::DuplicateCommit {
                detail: "hash already added to memory graph",
            });
        }

        let mut parent_positions = Vec::with_capacity(data.parent_oids.len());
        for parent in &data.parent_oids {
            let idx = self.positions.get(parent).ok_or(GraphError::NotFound)?;
            parent_positions.push(Position(*idx));
        }
        data.parent_positions = parent_positions;

        let pos = self.oids.len() as u32;
        self.positions.insert(oid, pos);
        self.oids.push(oid);
        self.commits.push(data);
        self.filters.push(filter);

        Ok(Position(pos))
    }

    /// Returns true if no commits have been added.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oids.is_empty()
    }
}

impl CommitGraph for MemoryGraph {
    #[inline]
    fn num_commits(&self) -> u32 {
        self.oids.len() as u32
    }

    fn lookup(&self, oid: &Oid) -> Result<Position, GraphError> {
        self.positions
            .get(oid)
            .map(|&idx| Position(idx))
            .ok_or(GraphError::NotFound)
    }

    fn commit_data(&self, pos: Position) -> Result<CommitData, GraphError> {
        self.commits
            .get(pos.0 as usize)
            .cloned()
            .ok_or(GraphError::NotFound)
    }

    fn oids(&self) -> Result<Vec<Oid>, GraphError> {
        Ok(self.oids.clone())
    }

    fn path_filter(&self, pos: Position) -> Result<PathFilter, GraphError> {
        self.filters
            .get(pos.0 as usize)
            .and_then(Clone::clone)
            .ok_or(GraphError::NotFound)
    }
}
