//! Commit-graph index with a fast-or-full traversal layer.
//!
//! ## Scope
//! This crate decodes, stages, and writes a compact commit-graph file: a
//! randomly-accessible binary index recording, per commit, its tree hash,
//! parent linkage, topological generation number, commit time, and an
//! optional changed-paths filter, all without deserializing full commit
//! objects. A thin node layer composes the index with a full object store
//! so history-walking code sees one interface either way.
//!
//! ## Key invariants
//! - The on-disk format is a wire contract: magic, chunk tags, field
//!   widths, endianness, sentinels, and bit packing are reproduced
//!   bit-exactly for interoperability with other readers and writers.
//! - Every miss (unknown hash, position out of range, absent filter,
//!   missing parent) is the single `GraphError::NotFound` condition, so
//!   "try fast path, then fall back" is one check.
//! - I/O errors from the byte source pass through unmodified; they are
//!   never folded into corruption errors.
//! - The fast index is an accelerator, never authoritative: hashes it
//!   lacks still resolve through the object store.
//!
//! ## Data flow
//! A maintenance pass feeds commits, parents first, into a
//! [`MemoryGraph`]; [`encode`] serializes it. Later, [`FileGraph::open`]
//! decodes the file lazily over any [`ReadAt`] source, and a
//! [`NodeIndex`] wraps it together with an [`ObjectSource`] for
//! traversal.
//!
//! ## Notable entry points
//! - [`FileGraph`] / [`MemoryGraph`]: the two [`CommitGraph`] backings.
//! - [`encode`] / [`encode_to_vec`]: graph serialization.
//! - [`NodeIndex`] / [`CommitNode`]: fast-or-full commit access.
//! - [`PathFilter`]: per-commit changed-paths membership.

pub mod encode;
pub mod errors;
pub mod file;
pub mod filter;
pub mod graph;
pub mod memory;
pub mod node;
pub mod oid;
pub mod source;

pub use encode::{encode, encode_to_vec};
pub use errors::{ChunkId, EncodeError, GraphError};
pub use file::FileGraph;
pub use filter::{PathFilter, FILTER_SIZE};
pub use graph::{CommitData, CommitGraph, Position, COMMIT_TIME_MASK, GENERATION_MAX};
pub use memory::MemoryGraph;
pub use node::{Commit, CommitNode, NodeIndex, ObjectSource, ParentIter};
pub use oid::{Oid, OID_LEN};
pub use source::ReadAt;
