//! Fast-or-full commit nodes over a graph plus an object store.
//!
//! Traversal code wants one interface whether a commit is answered from
//! the fast index or by loading the full object. [`CommitNode`] is an
//! exhaustive two-variant enum rather than a capability object with
//! runtime downcasts, so every operation handles both variants at
//! compile time.
//! [`NodeIndex`] borrows a [`CommitGraph`] and an [`ObjectSource`] (owns
//! neither) and always prefers the fast path.
//!
//! # Contract
//! - The index is purely an accelerator, never authoritative: any hash it
//!   does not contain (for example a commit newer than the last graph
//!   build) must still resolve through the object store.
//! - An `Indexed` node never loads a full commit unless the caller
//!   explicitly asks for one; its tree hash and parents come from decoded
//!   graph data.
//! - `parents` is a single-pass, non-restartable iterator; the uniform
//!   not-found condition terminates it, any other error is yielded.

use crate::errors::GraphError;
use crate::filter::PathFilter;
use crate::graph::{CommitData, CommitGraph, Position};
use crate::oid::Oid;

/// Fully-loaded commit, the narrow shape this core needs from an object
/// store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// Commit hash.
    pub oid: Oid,
    /// Root tree of the commit.
    pub tree: Oid,
    /// Parent hashes in commit order.
    pub parents: Vec<Oid>,
    /// Committer time in seconds since the Unix epoch.
    pub commit_time: u64,
}

/// Read capability a full object store must provide.
///
/// Called only on a fast-path miss. Implementations map their own
/// missing-object condition to [`GraphError::NotFound`] and pass storage
/// failures through as [`GraphError::Io`].
pub trait ObjectSource {
    /// The store's tree representation; opaque to this crate.
    type Tree;

    /// Loads a full commit by hash.
    fn commit(&self, oid: &Oid) -> Result<Commit, GraphError>;

    /// Loads a tree object by hash.
    fn tree(&self, oid: &Oid) -> Result<Self::Tree, GraphError>;
}

/// A commit as seen by traversal code: cheap graph record or full object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitNode {
    /// Answered from the fast index.
    Indexed {
        /// Commit hash.
        oid: Oid,
        /// Position in the owning graph.
        pos: Position,
        /// Decoded record.
        data: CommitData,
    },
    /// Answered by loading the full object.
    Loaded(Commit),
}

impl CommitNode {
    /// Returns the commit hash.
    #[must_use]
    pub fn oid(&self) -> &Oid {
        match self {
            Self::Indexed { oid, .. } => oid,
            Self::Loaded(commit) => &commit.oid,
        }
    }

    /// Returns the root tree hash without loading the full commit.
    ///
    /// This is the main performance benefit of the whole subsystem: an
    /// indexed node answers from its decoded record.
    #[must_use]
    pub fn tree_oid(&self) -> &Oid {
        match self {
            Self::Indexed { data, .. } => &data.tree,
            Self::Loaded(commit) => &commit.tree,
        }
    }

    /// Returns the committer time in seconds since the Unix epoch.
    ///
    /// For an indexed node this is the stored 34-bit-truncated value.
    #[must_use]
    pub fn commit_time(&self) -> u64 {
        match self {
            Self::Indexed { data, .. } => data.commit_time,
            Self::Loaded(commit) => commit.commit_time,
        }
    }

    /// Returns the number of parents.
    #[must_use]
    pub fn num_parents(&self) -> usize {
        match self {
            Self::Indexed { data, .. } => data.num_parents(),
            Self::Loaded(commit) => commit.parents.len(),
        }
    }

    /// Returns the generation number, known only for indexed nodes.
    #[must_use]
    pub fn generation(&self) -> Option<u32> {
        match self {
            Self::Indexed { data, .. } => Some(data.generation),
            Self::Loaded(_) => None,
        }
    }
}

/// Uniform commit access over a graph with object-store fallback.
///
/// Borrows both collaborators; creating one per traversal is cheap.
#[derive(Debug, Clone, Copy)]
pub struct NodeIndex<'a, G: ?Sized, S: ?Sized> {
    graph: &'a G,
    objects: &'a S,
}

impl<'a, G, S> NodeIndex<'a, G, S>
where
    G: CommitGraph + ?Sized,
    S: ObjectSource + ?Sized,
{
    /// Creates a node index over a graph and an object store.
    pub fn new(graph: &'a G, objects: &'a S) -> Self {
        Self { graph, objects }
    }

    /// Resolves a hash to a node, preferring the fast index.
    ///
    /// # Errors
    /// - `NotFound` if the hash is in neither the graph nor the store.
    /// - Any non-miss graph or store error, unmodified.
    pub fn node_from_hash(&self, oid: &Oid) -> Result<CommitNode, GraphError> {
        match self.graph.lookup(oid) {
            Ok(pos) => Ok(CommitNode::Indexed {
                oid: *oid,
                pos,
                data: self.graph.commit_data(pos)?,
            }),
            Err(err) if err.is_not_found() => self.objects.commit(oid).map(CommitNode::Loaded),
            Err(err) => Err(err),
        }
    }

    /// Resolves the `i`-th parent of a node.
    ///
    /// For an indexed node the parent comes from decoded graph data with
    /// no object load; for a loaded node the parent is loaded in full.
    ///
    /// # Errors
    /// `NotFound` if there is no parent `i`; callers walking parents use
    /// this as the end-of-sequence signal.
    pub fn parent_node(&self, node: &CommitNode, i: usize) -> Result<CommitNode, GraphError> {
        match node {
            CommitNode::Indexed { data, .. } => {
                let pos = *data.parent_positions.get(i).ok_or(GraphError::NotFound)?;
                let oid = *data.parent_oids.get(i).ok_or(GraphError::NotFound)?;
                Ok(CommitNode::Indexed {
                    oid,
                    pos,
                    data: self.graph.commit_data(pos)?,
                })
            }
            CommitNode::Loaded(commit) => {
                let oid = commit.parents.get(i).ok_or(GraphError::NotFound)?;
                self.objects.commit(oid).map(CommitNode::Loaded)
            }
        }
    }

    /// Returns a single-pass iterator over a node's parents.
    ///
    /// The sequence ends when `parent_node` reports the uniform not-found
    /// condition; any other error is yielded to the caller, who must not
    /// conflate the two.
    pub fn parents<'n>(&'n self, node: &'n CommitNode) -> ParentIter<'n, 'a, G, S> {
        ParentIter {
            index: self,
            node,
            next: 0,
        }
    }

    /// Fetches the changed-paths filter for a node.
    ///
    /// Only indexed nodes can possibly have one; loaded nodes always
    /// report `NotFound`.
    pub fn filter(&self, node: &CommitNode) -> Result<PathFilter, GraphError> {
        match node {
            CommitNode::Indexed { pos, .. } => self.graph.path_filter(*pos),
            CommitNode::Loaded(_) => Err(GraphError::NotFound),
        }
    }

    /// Loads the node's root tree from the object store.
    ///
    /// The tree hash itself comes from the node without a commit load;
    /// only the tree object is fetched.
    pub fn tree(&self, node: &CommitNode) -> Result<S::Tree, GraphError> {
        self.objects.tree(node.tree_oid())
    }

    /// Returns the full commit object, loading it on demand.
    ///
    /// This always costs an object load for indexed nodes, regardless of
    /// what the graph already knows.
    pub fn commit(&self, node: &CommitNode) -> Result<Commit, GraphError> {
        match node {
            CommitNode::Indexed { oid, .. } => self.objects.commit(oid),
            CommitNode::Loaded(commit) => Ok(commit.clone()),
        }
    }
}

/// Single-pass parent iterator; see [`NodeIndex::parents`].
pub struct ParentIter<'n, 'a, G: ?Sized, S: ?Sized> {
    index: &'n NodeIndex<'a, G, S>,
    node: &'n CommitNode,
    next: usize,
}

impl<G, S> Iterator for ParentIter<'_, '_, G, S>
where
    G: CommitGraph + ?Sized,
    S: ObjectSource + ?Sized,
{
    type Item = Result<CommitNode, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.index.parent_node(self.node, self.next);
        self.next += 1;
        match result {
            Err(err) if err.is_not_found() => None,
            other => Some(other),
        }
    }
}
