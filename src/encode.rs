//! Commit-graph serializer.
//!
//! Writes any [`CommitGraph`] into the chunked on-disk format. Chunk
//! offsets are computed up front from per-entry sizes and counts (no
//! padding), so the whole hash set must be enumerable in memory
//! before the first byte is written, even though readers elsewhere decode
//! lazily.
//!
//! # Algorithm
//! 1. Enumerate hashes, sort ascending, assign dense ids by sorted
//!    position; build a hash→id map and a per-first-byte histogram.
//! 2. Decide optional chunks: `EDGE` iff any commit has more than two
//!    parents; filter chunks iff any commit carries one, sparse
//!    (`XGSB` + packed `XGGB`) unless every commit has a filter.
//! 3. Compute fixed offsets, then write header, chunk directory, fanout,
//!    sorted hashes, commit records, filter section, edge table, and a
//!    trailing SHA-1 over everything written so far.
//!
//! # Costs
//! - Time: O(N log N) for the sort plus O(N) for the write pass.
//! - Fully synchronous and non-cancellable; graph construction is a
//!   periodic maintenance task, not a per-write hot path.

use std::collections::HashMap;
use std::io::{self, Write};

use sha1::{Digest, Sha1};

use crate::errors::{EncodeError, GraphError};
use crate::file::{
    CHECKSUM_SIZE, CHUNK_CDAT, CHUNK_EDGE, CHUNK_ENTRY_SIZE, CHUNK_OIDF, CHUNK_OIDL, CHUNK_XGGB,
    CHUNK_XGSB, COMMIT_DATA_SIZE, FANOUT_ENTRIES, FANOUT_SIZE, GRAPH_MAGIC, GRAPH_VERSION,
    HASH_ID_SHA1, HEADER_SIZE, LAST_EDGE_FLAG, OCTOPUS_FLAG, PARENT_NONE,
};
use crate::filter::{PathFilter, FILTER_SIZE};
use crate::graph::{CommitData, CommitGraph, COMMIT_TIME_MASK, GENERATION_MAX};
use crate::oid::{Oid, OID_LEN};

/// Filler written for a commit without a filter in a dense filter chunk.
/// All-ones keeps every probe true, so a missing filter can never report
/// a definite absence it has no grounds for.
const DENSE_FILTER_FILLER: u8 = 0xff;

/// Serializes `graph` into `out` in the on-disk format.
///
/// # Errors
/// - `Io` for writer failures.
/// - `Graph` if reading back records from `graph` fails, including a
///   parent hash that the graph does not contain.
/// - `TooManyCommits` if the commit count does not fit the 32-bit fanout.
pub fn encode<G, W>(graph: &G, out: W) -> Result<(), EncodeError>
where
    G: CommitGraph + ?Sized,
    W: Write,
{
    let mut oids = graph.oids()?;
    oids.sort_unstable();

    if oids.len() > u32::MAX as usize {
        return Err(EncodeError::TooManyCommits {
            count: oids.len(),
            max: u32::MAX,
        });
    }
    let n = oids.len();

    let mut ids: HashMap<Oid, u32> = HashMap::with_capacity(n);
    let mut fanout = [0u32; FANOUT_ENTRIES];
    for (id, oid) in oids.iter().enumerate() {
        ids.insert(*oid, id as u32);
        fanout[oid.first_byte() as usize] += 1;
    }
    let mut running = 0u32;
    for slot in &mut fanout {
        running += *slot;
        *slot = running;
    }

    // Fetch every record and filter in output-id order, via the source
    // graph's own positions.
    let mut records: Vec<CommitData> = Vec::with_capacity(n);
    let mut filters: Vec<Option<PathFilter>> = Vec::with_capacity(n);
    for oid in &oids {
        let pos = graph.lookup(oid)?;
        records.push(graph.commit_data(pos)?);
        match graph.path_filter(pos) {
            Ok(filter) => filters.push(Some(filter)),
            Err(err) if err.is_not_found() => filters.push(None),
            Err(err) => return Err(err.into()),
        }
    }

    let edge_entries: usize = records
        .iter()
        .filter(|r| r.num_parents() > 2)
        .map(|r| r.num_parents() - 1)
        .sum();
    let has_edge = edge_entries > 0;

    let filter_count = filters.iter().filter(|f| f.is_some()).count();
    let has_filters = filter_count > 0;
    let dense_filters = has_filters && filter_count == n;

    // Chunk list in physical write order; sizes are exact.
    let mut chunks: Vec<([u8; 4], u64)> = vec![
        (CHUNK_OIDF, FANOUT_SIZE),
        (CHUNK_OIDL, (n * OID_LEN) as u64),
        (CHUNK_CDAT, n as u64 * COMMIT_DATA_SIZE),
    ];
    if has_filters && !dense_filters {
        chunks.push((CHUNK_XGSB, (n as u64 + 7) / 8));
        chunks.push((CHUNK_XGGB, (filter_count * FILTER_SIZE) as u64));
    } else if has_filters {
        chunks.push((CHUNK_XGGB, (n * FILTER_SIZE) as u64));
    }
    if has_edge {
        chunks.push((CHUNK_EDGE, (edge_entries * 4) as u64));
    }

    let mut writer = HashingWriter::new(out);

    // Header.
    writer.write_all(&GRAPH_MAGIC)?;
    writer.write_all(&[GRAPH_VERSION, HASH_ID_SHA1, chunks.len() as u8, 0])?;

    // Chunk directory.
    let mut offset = HEADER_SIZE + chunks.len() as u64 * CHUNK_ENTRY_SIZE;
    for (tag, size) in &chunks {
        writer.write_all(tag)?;
        writer.write_all(&offset.to_be_bytes())?;
        offset += size;
    }

    // Fanout table.
    for count in fanout {
        writer.write_all(&count.to_be_bytes())?;
    }

    // Sorted hash table.
    for oid in &oids {
        writer.write_all(oid.as_slice())?;
    }

    // Commit records; octopus overflow accumulates into the edge buffer
    // written after the filter section.
    let mut edges: Vec<u32> = Vec::with_capacity(edge_entries);
    for record in &records {
        writer.write_all(record.tree.as_slice())?;

        let parent_ids = resolve_parent_ids(record, &ids)?;
        let (parent1, parent2) = match parent_ids.len() {
            0 => (PARENT_NONE, PARENT_NONE),
            1 => (parent_ids[0], PARENT_NONE),
            2 => (parent_ids[0], parent_ids[1]),
            len => {
                let start = edges.len() as u32;
                for (i, id) in parent_ids[1..].iter().enumerate() {
                    let mut word = *id;
                    if i == len - 2 {
                        word |= LAST_EDGE_FLAG;
                    }
                    edges.push(word);
                }
                (parent_ids[0], OCTOPUS_FLAG | start)
            }
        };
        writer.write_all(&parent1.to_be_bytes())?;
        writer.write_all(&parent2.to_be_bytes())?;

        let generation = u64::from(record.generation.min(GENERATION_MAX));
        let packed = (generation << 34) | (record.commit_time & COMMIT_TIME_MASK);
        writer.write_all(&packed.to_be_bytes())?;
    }

    // Filter section.
    if has_filters && !dense_filters {
        let mut bitmap = vec![0u8; (n + 7) / 8];
        for (id, filter) in filters.iter().enumerate() {
            if filter.is_some() {
                bitmap[id >> 3] |= 1 << (id & 7);
            }
        }
        writer.write_all(&bitmap)?;
        for filter in filters.iter().flatten() {
            writer.write_all(filter.data())?;
        }
    } else if has_filters {
        for filter in &filters {
            match filter {
                Some(filter) => writer.write_all(filter.data())?,
                None => writer.write_all(&[DENSE_FILTER_FILLER; FILTER_SIZE])?,
            }
        }
    }

    // Octopus overflow table.
    for word in &edges {
        writer.write_all(&word.to_be_bytes())?;
    }

    // Trailing checksum over everything written so far.
    let (mut inner, digest) = writer.finish();
    debug_assert_eq!(digest.len() as u64, CHECKSUM_SIZE);
    inner.write_all(&digest)?;
    inner.flush()?;

    Ok(())
}

/// Serializes `graph` into an owned buffer.
///
/// # Errors
/// Same conditions as [`encode`].
pub fn encode_to_vec<G>(graph: &G) -> Result<Vec<u8>, EncodeError>
where
    G: CommitGraph + ?Sized,
{
    let mut out = Vec::new();
    encode(graph, &mut out)?;
    Ok(out)
}

/// Maps a record's parent hashes to output ids.
fn resolve_parent_ids(record: &CommitData, ids: &HashMap<Oid, u32>) -> Result<Vec<u32>, EncodeError> {
    let mut parent_ids = Vec::with_capacity(record.num_parents());
    for parent in &record.parent_oids {
        // A parent hash the graph does not contain cannot be encoded; the
        // uniform not-found condition names exactly that.
        let id = ids.get(parent).ok_or(GraphError::NotFound)?;
        parent_ids.push(*id);
    }
    Ok(parent_ids)
}

/// Writer wrapper that folds every written byte into a SHA-1 digest.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha1,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha1::new(),
        }
    }

    fn finish(self) -> (W, [u8; CHECKSUM_SIZE as usize]) {
        (self.inner, self.hasher.finalize().into())
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
