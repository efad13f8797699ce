//! Error types for commit-graph decoding and encoding.
//!
//! Errors are stage-specific: `GraphError` covers the read side (open,
//! lookup, record and filter fetches), `EncodeError` the write side. Both
//! are `#[non_exhaustive]` so variants can be added without breaking
//! callers; consumers should include a fallback match arm.
//!
//! # Design Notes
//! - `NotFound` is deliberately one variant shared by every miss (hash
//!   absent, position out of bounds, filter absent, parent index out of
//!   range) so callers can implement "try fast path, then fall back" with
//!   a single check.
//! - I/O errors from the byte source are preserved as sources and never
//!   folded into corruption variants, so "not a graph file" stays
//!   distinguishable from "storage failed".
//! - Variants with `detail` carry human-readable context and are not
//!   stable for machine parsing.

use std::fmt;
use std::io;

/// A 4-byte chunk identifier with human-readable Display.
///
/// Prints as ASCII when all bytes are printable, otherwise as hex.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// Creates a ChunkId from a 4-byte array.
    #[inline]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|&b| b.is_ascii_graphic()) {
            for &b in &self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(
                f,
                "[{:02x}, {:02x}, {:02x}, {:02x}]",
                self.0[0], self.0[1], self.0[2], self.0[3]
            )
        }
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self)
    }
}

/// Errors from opening and reading a commit-graph.
#[derive(Debug)]
#[non_exhaustive]
pub enum GraphError {
    /// The graph file is corrupt or malformed; opening must fail.
    Corrupt { detail: &'static str },
    /// Unsupported file format version.
    UnsupportedVersion { version: u8 },
    /// Unsupported hash algorithm id (only 1 = 20-byte hashes).
    UnsupportedHash { hash_id: u8 },
    /// A mandatory chunk is absent or has a zero offset.
    MissingChunk { chunk_id: ChunkId },
    /// A commit was added whose hash is already present.
    DuplicateCommit { detail: &'static str },
    /// The requested hash, position, filter, or parent is not present.
    NotFound,
    /// I/O error from the underlying byte source, unmodified.
    Io(io::Error),
}

impl GraphError {
    /// Constructs a corruption error with a static detail string.
    #[inline]
    pub const fn corrupt(detail: &'static str) -> Self {
        Self::Corrupt { detail }
    }

    /// Returns true for the uniform not-found condition.
    ///
    /// Fallback-capable callers branch on this alone; every other variant
    /// is a hard failure.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { detail } => write!(f, "corrupt commit-graph: {detail}"),
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported commit-graph version: {version} (expected 1)")
            }
            Self::UnsupportedHash { hash_id } => {
                write!(f, "unsupported hash algorithm id: {hash_id} (expected 1)")
            }
            Self::MissingChunk { chunk_id } => {
                write!(f, "commit-graph missing required chunk: {chunk_id}")
            }
            Self::DuplicateCommit { detail } => {
                write!(f, "duplicate commit: {detail}")
            }
            Self::NotFound => write!(f, "not found in commit-graph"),
            Self::Io(err) => write!(f, "commit-graph I/O error: {err}"),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors from serializing a graph to the on-disk format.
#[derive(Debug)]
#[non_exhaustive]
pub enum EncodeError {
    /// I/O error from the output writer.
    Io(io::Error),
    /// Reading from the source graph failed.
    Graph(GraphError),
    /// Too many commits for the 32-bit fanout table.
    TooManyCommits { count: usize, max: u32 },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "commit-graph write error: {err}"),
            Self::Graph(err) => write!(f, "commit-graph source error: {err}"),
            Self::TooManyCommits { count, max } => {
                write!(f, "too many commits: {count} (max: {max})")
            }
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Graph(err) => Some(err),
            Self::TooManyCommits { .. } => None,
        }
    }
}

impl From<io::Error> for EncodeError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<GraphError> for EncodeError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}
