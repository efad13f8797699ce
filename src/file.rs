//! Chunked binary commit-graph reader.
//!
//! Decodes the on-disk format against a borrowed [`ReadAt`] source. The
//! header, chunk directory, fanout table, and (when present) the sparse
//! filter slot map are read eagerly at open. Hash entries, commit
//! records, and filter bytes are read on demand, a few bytes per
//! operation.
//!
//! # Layout
//! - Header: magic `"CGPH"`, version 1, hash id 1, chunk count, reserved.
//! - Chunk directory: `C` entries of 4-byte tag + 8-byte offset. Unknown
//!   tags are ignored for forward compatibility; recognized tags are
//!   dispatched through an explicit tag table.
//! - `OIDF` fanout, `OIDL` sorted hashes, `CDAT` records, optional `EDGE`
//!   octopus overflow, optional `XGGB` filters and `XGSB` presence bitmap.
//! - Trailing 20-byte checksum (not validated on open; it is a writer
//!   artifact and the eager validation below bounds every read).
//!
//! # Invariants
//! - `num_commits` equals `fanout[255]`; the fanout is non-decreasing.
//! - Mandatory chunk extents are validated against the source length at
//!   open, so record reads cannot run past the file.
//! - The graph is immutable after open and safe for concurrent readers
//!   whenever the source is: the sparse slot map is built exactly once,
//!   at open, and never mutated afterwards.
//!
//! # Complexity
//! - `lookup` is `O(log N)` within a fanout bucket.
//! - `commit_data` is `O(parents)`; octopus parents walk `EDGE` until the
//!   terminating flag.

use std::collections::HashMap;

use crate::errors::{ChunkId, GraphError};
use crate::filter::{PathFilter, FILTER_SIZE};
use crate::graph::{CommitData, CommitGraph, Position, COMMIT_TIME_MASK};
use crate::oid::{Oid, OID_LEN};
use crate::source::ReadAt;

/// Commit-graph magic bytes.
pub(crate) const GRAPH_MAGIC: [u8; 4] = *b"CGPH";
/// Supported format version.
pub(crate) const GRAPH_VERSION: u8 = 1;
/// Supported hash algorithm id (20-byte hashes).
pub(crate) const HASH_ID_SHA1: u8 = 1;
/// Header size (8 bytes).
pub(crate) const HEADER_SIZE: u64 = 8;
/// Chunk directory entry size (4-byte tag + 8-byte offset).
pub(crate) const CHUNK_ENTRY_SIZE: u64 = 12;
/// Fanout table entries.
pub(crate) const FANOUT_ENTRIES: usize = 256;
/// Fanout table size in bytes.
pub(crate) const FANOUT_SIZE: u64 = (FANOUT_ENTRIES * 4) as u64;
/// Per-commit record size in `CDAT`.
pub(crate) const COMMIT_DATA_SIZE: u64 = 36;
/// Trailing checksum size.
pub(crate) const CHECKSUM_SIZE: u64 = 20;

/// Fanout chunk tag.
pub(crate) const CHUNK_OIDF: [u8; 4] = *b"OIDF";
/// Sorted hash table chunk tag.
pub(crate) const CHUNK_OIDL: [u8; 4] = *b"OIDL";
/// Commit data chunk tag.
pub(crate) const CHUNK_CDAT: [u8; 4] = *b"CDAT";
/// Octopus overflow chunk tag.
pub(crate) const CHUNK_EDGE: [u8; 4] = *b"EDGE";
/// Changed-paths filter chunk tag.
pub(crate) const CHUNK_XGGB: [u8; 4] = *b"XGGB";
/// Sparse filter presence bitmap chunk tag.
pub(crate) const CHUNK_XGSB: [u8; 4] = *b"XGSB";

/// Sentinel parent field value meaning "no parent".
pub(crate) const PARENT_NONE: u32 = 0x7000_0000;
/// High bit on parent2: octopus merge, low 31 bits index into `EDGE`.
pub(crate) const OCTOPUS_FLAG: u32 = 0x8000_0000;
/// High bit on an `EDGE` entry: last overflow parent for this commit.
pub(crate) const LAST_EDGE_FLAG: u32 = 0x8000_0000;
/// Low 31 bits of parent and edge words.
pub(crate) const EDGE_MASK: u32 = 0x7fff_ffff;

/// Recognized chunk offsets collected from the directory.
#[derive(Debug, Default, Clone, Copy)]
struct ChunkOffsets {
    oidf: Option<u64>,
    oidl: Option<u64>,
    cdat: Option<u64>,
    edge: Option<u64>,
    filters: Option<u64>,
    bitmap: Option<u64>,
}

fn set_oidf(offsets: &mut ChunkOffsets, off: u64) {
    offsets.oidf = Some(off);
}
fn set_oidl(offsets: &mut ChunkOffsets, off: u64) {
    offsets.oidl = Some(off);
}
fn set_cdat(offsets: &mut ChunkOffsets, off: u64) {
    offsets.cdat = Some(off);
}
fn set_edge(offsets: &mut ChunkOffsets, off: u64) {
    offsets.edge = Some(off);
}
fn set_filters(offsets: &mut ChunkOffsets, off: u64) {
    offsets.filters = Some(off);
}
fn set_bitmap(offsets: &mut ChunkOffsets, off: u64) {
    offsets.bitmap = Some(off);
}

/// Tag dispatch table for the chunk directory. New chunk kinds get a row
/// here; existing decode paths stay untouched.
const CHUNK_TABLE: &[([u8; 4], fn(&mut ChunkOffsets, u64))] = &[
    (CHUNK_OIDF, set_oidf),
    (CHUNK_OIDL, set_oidl),
    (CHUNK_CDAT, set_cdat),
    (CHUNK_EDGE, set_edge),
    (CHUNK_XGGB, set_filters),
    (CHUNK_XGSB, set_bitmap),
];

/// Read-only commit graph decoded from a chunked binary file.
///
/// Borrows its byte source and never closes it; the caller owns the
/// source's lifetime (a `&[u8]` over an mmap, a `&File`, ...).
#[derive(Debug)]
pub struct FileGraph<R> {
    source: R,
    source_len: u64,
    num_commits: u32,
    fanout: [u32; FANOUT_ENTRIES],
    oidl_off: u64,
    cdat_off: u64,
    edge_off: Option<u64>,
    filters_off: Option<u64>,
    /// Dense id -> packed filter slot, present only for sparse layouts.
    /// Built once at open; immutable afterwards.
    filter_slots: Option<HashMap<u32, u32>>,
}

impl<R: ReadAt> FileGraph<R> {
    /// Opens a commit-graph over a random-access byte source.
    ///
    /// Validates the header, chunk directory, and fanout table, and builds
    /// the sparse filter slot map when a presence bitmap is present. Hash
    /// entries, commit records, and filter bytes are not touched until
    /// asked for.
    ///
    /// # Errors
    /// - `Corrupt` / `UnsupportedVersion` / `UnsupportedHash` /
    ///   `MissingChunk` for malformed files; there is no partial-open
    ///   mode.
    /// - `Io` for source failures, passed through unmodified.
    pub fn open(source: R) -> Result<Self, GraphError> {
        let source_len = source.len()?;
        if source_len < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(GraphError::corrupt("file too small"));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        source.read_at(0, &mut header)?;

        if header[0..4] != GRAPH_MAGIC {
            return Err(GraphError::corrupt("invalid magic"));
        }
        if header[4] != GRAPH_VERSION {
            return Err(GraphError::UnsupportedVersion { version: header[4] });
        }
        if header[5] != HASH_ID_SHA1 {
            return Err(GraphError::UnsupportedHash { hash_id: header[5] });
        }
        let chunk_count = header[6];

        let dir_end = HEADER_SIZE + u64::from(chunk_count) * CHUNK_ENTRY_SIZE;
        if dir_end > source_len {
            return Err(GraphError::corrupt("chunk directory extends past file"));
        }

        let mut offsets = ChunkOffsets::default();
        let mut entry = [0u8; CHUNK_ENTRY_SIZE as usize];
        for i in 0..u64::from(chunk_count) {
            source.read_at(HEADER_SIZE + i * CHUNK_ENTRY_SIZE, &mut entry)?;
            let tag = [entry[0], entry[1], entry[2], entry[3]];
            let offset = u64::from_be_bytes([
                entry[4], entry[5], entry[6], entry[7], entry[8], entry[9], entry[10], entry[11],
            ]);

            if let Some((_, apply)) = CHUNK_TABLE.iter().find(|(t, _)| *t == tag) {
                if offset > source_len {
                    return Err(GraphError::corrupt("chunk offset extends past file"));
                }
                apply(&mut offsets, offset);
            }
            // Unrecognized tags are skipped: newer writers may add chunks.
        }

        let oidf_off = require_chunk(offsets.oidf, CHUNK_OIDF)?;
        let oidl_off = require_chunk(offsets.oidl, CHUNK_OIDL)?;
        let cdat_off = require_chunk(offsets.cdat, CHUNK_CDAT)?;

        if oidf_off + FANOUT_SIZE > source_len {
            return Err(GraphError::corrupt("fanout table extends past file"));
        }
        let mut fanout_bytes = [0u8; FANOUT_SIZE as usize];
        source.read_at(oidf_off, &mut fanout_bytes)?;

        let mut fanout = [0u32; FANOUT_ENTRIES];
        let mut prev = 0u32;
        for (i, slot) in fanout.iter_mut().enumerate() {
            let off = i * 4;
            let val = u32::from_be_bytes([
                fanout_bytes[off],
                fanout_bytes[off + 1],
                fanout_bytes[off + 2],
                fanout_bytes[off + 3],
            ]);
            if val < prev {
                return Err(GraphError::corrupt("fanout not monotonic"));
            }
            prev = val;
            *slot = val;
        }
        let num_commits = fanout[FANOUT_ENTRIES - 1];
        let n = u64::from(num_commits);

        if oidl_off + n * OID_LEN as u64 > source_len {
            return Err(GraphError::corrupt("hash table extends past file"));
        }
        if cdat_off + n * COMMIT_DATA_SIZE > source_len {
            return Err(GraphError::corrupt("commit data extends past file"));
        }

        // The slot map for sparse filters indexes packed `XGGB` rows by
        // dense id. Building it here, before the graph is shared, is what
        // makes concurrent readers safe without a lock.
        let filter_slots = match (offsets.filters, offsets.bitmap) {
            (Some(filters_off), Some(bitmap_off)) => {
                let map = read_filter_slots(&source, source_len, bitmap_off, num_commits)?;
                let slots = map.len() as u64;
                if filters_off + slots * FILTER_SIZE as u64 > source_len {
                    return Err(GraphError::corrupt("filter data extends past file"));
                }
                Some(map)
            }
            (Some(filters_off), None) => {
                if filters_off + n * FILTER_SIZE as u64 > source_len {
                    return Err(GraphError::corrupt("filter data extends past file"));
                }
                None
            }
            // A bitmap without filter data carries nothing fetchable.
            _ => None,
        };

        Ok(Self {
            source,
            source_len,
            num_commits,
            fanout,
            oidl_off,
            cdat_off,
            edge_off: offsets.edge,
            filters_off: offsets.filters,
            filter_slots,
        })
    }

    /// Returns the borrowed byte source.
    #[inline]
    pub fn source(&self) -> &R {
        &self.source
    }

    /// Returns the fanout value for a first-byte value: the exclusive
    /// upper bound of that byte's bucket in the sorted hash table.
    #[inline]
    #[must_use]
    pub fn fanout(&self, first_byte: u8) -> u32 {
        self.fanout[first_byte as usize]
    }

    /// Reads the hash stored at a position.
    fn oid_at(&self, pos: u32) -> Result<Oid, GraphError> {
        if pos >= self.num_commits {
            return Err(GraphError::NotFound);
        }
        let mut bytes = [0u8; OID_LEN];
        self.source
            .read_at(self.oidl_off + u64::from(pos) * OID_LEN as u64, &mut bytes)?;
        Ok(Oid::new(bytes))
    }

    /// Walks the `EDGE` overflow list from `start` until the entry
    /// carrying the last-parent flag.
    fn read_edges(&self, start: u32, parents: &mut Vec<u32>) -> Result<(), GraphError> {
        let edge_off = self
            .edge_off
            .ok_or(GraphError::corrupt("octopus merge without EDGE chunk"))?;

        let mut idx = u64::from(start);
        loop {
            let off = edge_off + idx * 4;
            if off + 4 > self.source_len {
                return Err(GraphError::corrupt("EDGE walk past end of file"));
            }
            let mut word = [0u8; 4];
            self.source.read_at(off, &mut word)?;
            let value = u32::from_be_bytes(word);

            parents.push(value & EDGE_MASK);
            if value & LAST_EDGE_FLAG != 0 {
                return Ok(());
            }
            idx += 1;
        }
    }

    /// Decodes the parent ids of one `CDAT` record.
    fn decode_parents(&self, parent1: u32, parent2: u32) -> Result<Vec<u32>, GraphError> {
        let mut parents = Vec::new();
        if parent1 == PARENT_NONE {
            return Ok(parents);
        }
        parents.push(parent1);

        if parent2 == PARENT_NONE {
            return Ok(parents);
        }
        if parent2 & OCTOPUS_FLAG != 0 {
            self.read_edges(parent2 & EDGE_MASK, &mut parents)?;
        } else {
            parents.push(parent2);
        }
        Ok(parents)
    }
}

fn require_chunk(offset: Option<u64>, tag: [u8; 4]) -> Result<u64, GraphError> {
    match offset {
        Some(off) if off > 0 => Ok(off),
        _ => Err(GraphError::MissingChunk {
            chunk_id: ChunkId::new(tag),
        }),
    }
}

/// Reads the `XGSB` presence bitmap and maps each present dense id to its
/// packed slot (the running count of set bits before it). Bit `i` lives at
/// byte `i >> 3`, bit `i & 7`.
fn read_filter_slots<R: ReadAt>(
    source: &R,
    source_len: u64,
    bitmap_off: u64,
    num_commits: u32,
) -> Result<HashMap<u32, u32>, GraphError> {
    let bitmap_len = (u64::from(num_commits) + 7) / 8;
    if bitmap_off + bitmap_len > source_len {
        return Err(GraphError::corrupt("presence bitmap extends past file"));
    }

    let mut bitmap = vec![0u8; bitmap_len as usize];
    source.read_at(bitmap_off, &mut bitmap)?;

    let mut slots = HashMap::new();
    let mut next_slot = 0u32;
    for id in 0..num_commits {
        if bitmap[(id >> 3) as usize] & (1 << (id & 7)) != 0 {
            slots.insert(id, next_slot);
            next_slot += 1;
        }
    }
    Ok(slots)
}

impl<R: ReadAt> CommitGraph for FileGraph<R> {
    #[inline]
    fn num_commits(&self) -> u32 {
        self.num_commits
    }

    fn lookup(&self, oid: &Oid) -> Result<Position, GraphError> {
        let first = oid.first_byte();
        let mut hi = self.fanout(first);
        let mut lo = if first == 0 { 0 } else { self.fanout(first - 1) };

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_oid = self.oid_at(mid)?;
            match oid.cmp(&mid_oid) {
                std::cmp::Ordering::Less => hi = mid,
                std::cmp::Ordering::Greater => lo = mid + 1,
                std::cmp::Ordering::Equal => return Ok(Position(mid)),
            }
        }
        Err(GraphError::NotFound)
    }

    fn commit_data(&self, pos: Position) -> Result<CommitData, GraphError> {
        if pos.0 >= self.num_commits {
            return Err(GraphError::NotFound);
        }

        let mut record = [0u8; COMMIT_DATA_SIZE as usize];
        self.source
            .read_at(self.cdat_off + u64::from(pos.0) * COMMIT_DATA_SIZE, &mut record)?;

        let tree = Oid::from_slice(&record[0..OID_LEN]);
        let parent1 = u32::from_be_bytes([record[20], record[21], record[22], record[23]]);
        let parent2 = u32::from_be_bytes([record[24], record[25], record[26], record[27]]);
        let packed = u64::from_be_bytes([
            record[28], record[29], record[30], record[31], record[32], record[33], record[34],
            record[35],
        ]);

        let parent_ids = self.decode_parents(parent1, parent2)?;

        let mut parent_positions = Vec::with_capacity(parent_ids.len());
        let mut parent_oids = Vec::with_capacity(parent_ids.len());
        for id in parent_ids {
            // Resolved by re-reading the sorted hash table; an id outside
            // the graph is the uniform not-found condition.
            parent_oids.push(self.oid_at(id)?);
            parent_positions.push(Position(id));
        }

        Ok(CommitData {
            tree,
            parent_oids,
            parent_positions,
            generation: (packed >> 34) as u32,
            commit_time: packed & COMMIT_TIME_MASK,
        })
    }

    fn oids(&self) -> Result<Vec<Oid>, GraphError> {
        let mut oids = Vec::with_capacity(self.num_commits as usize);
        for pos in 0..self.num_commits {
            oids.push(self.oid_at(pos)?);
        }
        Ok(oids)
    }

    fn path_filter(&self, pos: Position) -> Result<PathFilter, GraphError> {
        let filters_off = self.filters_off.ok_or(GraphError::NotFound)?;
        if pos.0 >= self.num_commits {
            return Err(GraphError::NotFound);
        }

        let slot = match &self.filter_slots {
            Some(slots) => u64::from(*slots.get(&pos.0).ok_or(GraphError::NotFound)?),
            None => u64::from(pos.0),
        };

        let mut bytes = [0u8; FILTER_SIZE];
        self.source
            .read_at(filters_off + slot * FILTER_SIZE as u64, &mut bytes)?;
        Ok(PathFilter::from_bytes(bytes))
    }
}
