//! Changed-paths filter for a single commit.
//!
//! A fixed-size probabilistic set: 5120 bits (640 bytes), 7 probe bits per
//! path, derived from one keyed SipHash-2-4 digest with a zero key. The
//! digest is split into two 32-bit lanes `a` (low) and `b` (high); probe
//! `i` sets bit `(a + b*i) mod 5120`. Being fixed-size, the raw bytes need
//! no length prefix on disk.
//!
//! # Invariants
//! - No false negatives: any path passed to `add` always tests true.
//! - `test` returning false is a definite absence; true means "possibly
//!   present" (false positives allowed).
//! - `test` is deterministic given fixed filter bytes and path.
//!
//! The hash construction is part of the wire format: filters written here
//! must probe identically in every other reader of the same file.

use std::fmt;
use std::hash::Hasher;

use siphasher::sip::SipHasher24;

/// Filter size in bytes.
pub const FILTER_SIZE: usize = 640;

/// Filter size in bits.
const FILTER_BITS: u32 = (FILTER_SIZE * 8) as u32;

/// Probes per path.
const FILTER_PROBES: u32 = 7;

/// Fixed-size changed-paths filter.
#[derive(Clone, PartialEq, Eq)]
pub struct PathFilter {
    bits: [u8; FILTER_SIZE],
}

impl PathFilter {
    /// Creates an empty filter (tests false for every path).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: [0u8; FILTER_SIZE],
        }
    }

    /// Reconstructs a filter from its raw 640-byte representation.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bits: [u8; FILTER_SIZE]) -> Self {
        Self { bits }
    }

    /// Reconstructs a filter from a slice, returning `None` unless it is
    /// exactly 640 bytes.
    #[must_use]
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != FILTER_SIZE {
            return None;
        }
        let mut bits = [0u8; FILTER_SIZE];
        bits.copy_from_slice(bytes);
        Some(Self { bits })
    }

    /// Returns the raw filter bytes.
    #[inline]
    #[must_use]
    pub const fn data(&self) -> &[u8; FILTER_SIZE] {
        &self.bits
    }

    /// Records `path` in the filter.
    pub fn add(&mut self, path: &[u8]) {
        let (a, b) = lanes(path);
        for i in 0..FILTER_PROBES {
            let bit = probe_bit(a, b, i);
            self.bits[(bit >> 3) as usize] |= 1 << (bit & 7);
        }
    }

    /// Tests whether `path` may have been recorded.
    ///
    /// False means the path was definitely not added.
    #[must_use]
    pub fn test(&self, path: &[u8]) -> bool {
        let (a, b) = lanes(path);
        for i in 0..FILTER_PROBES {
            let bit = probe_bit(a, b, i);
            if self.bits[(bit >> 3) as usize] & (1 << (bit & 7)) == 0 {
                return false;
            }
        }
        true
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: u32 = self.bits.iter().map(|b| b.count_ones()).sum();
        write!(f, "PathFilter({set}/{FILTER_BITS} bits set)")
    }
}

/// Splits the path digest into its two 32-bit probe lanes.
fn lanes(path: &[u8]) -> (u32, u32) {
    let mut hasher = SipHasher24::new_with_keys(0, 0);
    hasher.write(path);
    let digest = hasher.finish();
    (digest as u32, (digest >> 32) as u32)
}

/// Bit index for probe `i`: `(a + b*i) mod 5120` in wrapping u32 space.
#[inline]
fn probe_bit(a: u32, b: u32, i: u32) -> u32 {
    a.wrapping_add(b.wrapping_mul(i)) % FILTER_BITS
}
