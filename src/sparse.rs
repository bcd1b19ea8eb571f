//! Sparse representation: a compact encoding of the non-zero registers only,
//! used while the observed cardinality is small relative to `m`.
//!
//! Entries are `(index, rank)` pairs, unique by index, kept in ascending index
//! order and encoded as `varint(index delta) ++ varint(rank)`. The first
//! entry's delta is its index; later deltas are the gap to the previous index
//! and therefore never zero. The store owns a growable byte buffer with exact
//! size accounting.
//!
//! Updates are absorbed by a bounded insert-or-max buffer and merged into the
//! encoded stream in sorted batches, keeping per-update cost amortized
//! sub-linear in `m`. Reads (estimation, serialization, conversion to dense)
//! operate on a merged view of the stream and the buffer without mutating the
//! store.

use std::collections::HashMap;
use std::iter::Peekable;

use crate::codec;
use crate::config::Config;
use crate::dense::DenseRegisters;
use crate::estimate;
use crate::sketch::RegisterStore;

/// Pending updates are compacted into the encoded stream once the buffer
/// reaches this many distinct indices.
const INSERT_BUFFER_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub(crate) struct SparseRegisters {
    config: Config,
    /// Delta + varint encoded `(index, rank)` entries, ascending by index.
    encoded: Vec<u8>,
    /// Number of entries in `encoded`.
    entries: usize,
    /// Insert-or-max buffer of updates not yet merged into `encoded`.
    buffer: HashMap<u32, u8>,
}

impl SparseRegisters {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            encoded: Vec::new(),
            entries: 0,
            buffer: HashMap::new(),
        }
    }

    /// Rebuild a store from entries already sorted strictly ascending by index.
    pub(crate) fn from_sorted_entries(config: Config, pairs: &[(u32, u8)]) -> Self {
        let (encoded, entries) = encode_entries(pairs.iter().copied());
        Self {
            config,
            encoded,
            entries,
            buffer: HashMap::new(),
        }
    }

    /// Merged, index-ascending view over the encoded stream and the pending
    /// buffer, taking the maximum rank where both hold the same index.
    pub(crate) fn merged_entries(&self) -> MergedEntries<'_> {
        let mut pending: Vec<(u32, u8)> = self.buffer.iter().map(|(&i, &r)| (i, r)).collect();
        pending.sort_unstable_by_key(|&(index, _)| index);
        UnionIter::new(EntryIter::new(&self.encoded), pending.into_iter())
    }

    /// Merge the pending buffer into the encoded stream.
    pub(crate) fn compact(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let (encoded, entries) = encode_entries(self.merged_entries());
        self.encoded = encoded;
        self.entries = entries;
        self.buffer.clear();
    }

    /// Union with another sparse store, taking max rank per shared index.
    pub(crate) fn merge_from(&mut self, other: &SparseRegisters) {
        debug_assert_eq!(self.config, other.config);
        let (encoded, entries) =
            encode_entries(UnionIter::new(self.merged_entries(), other.merged_entries()));
        self.encoded = encoded;
        self.entries = entries;
        self.buffer.clear();
    }

    /// Materialize a dense store with all encoded pairs applied; unset indices
    /// stay at rank 0. Does not mutate the sparse store.
    pub(crate) fn to_dense(&self) -> DenseRegisters {
        let mut dense = DenseRegisters::new(self.config);
        for (index, rank) in self.merged_entries() {
            dense.update(index, rank);
        }
        dense
    }

    /// Whether the store has outgrown the sparse regime. Compaction runs
    /// first when the pending buffer could tip the decision.
    pub(crate) fn over_threshold(&mut self) -> bool {
        if self.entries + self.buffer.len() <= self.config.promotion_entries()
            && self.encoded.len() <= self.config.promotion_bytes()
        {
            return false;
        }
        self.compact();
        self.entries > self.config.promotion_entries()
            || self.encoded.len() > self.config.promotion_bytes()
    }

    /// Canonical encoded stream and entry count, including pending updates.
    pub(crate) fn encoded_snapshot(&self) -> (Vec<u8>, usize) {
        if self.buffer.is_empty() {
            (self.encoded.clone(), self.entries)
        } else {
            encode_entries(self.merged_entries())
        }
    }

    /// Exact byte length of the compacted entries.
    #[cfg(test)]
    pub(crate) fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

impl RegisterStore for SparseRegisters {
    /// Insert-or-max into the pending buffer, compacting in batches.
    fn update(&mut self, index: u32, rank: u8) {
        debug_assert!(rank > 0 && rank <= self.config.max_rank());
        let slot = self.buffer.entry(index).or_insert(0);
        *slot = (*slot).max(rank);
        if self.buffer.len() >= INSERT_BUFFER_LIMIT {
            self.compact();
        }
    }

    /// Estimate over the merged pair view: zero count and harmonic sum are
    /// derived without materializing `m` registers.
    fn estimate(&self) -> f64 {
        let m = self.config.registers();
        let mut distinct: u32 = 0;
        let mut nonzero_sum = 0.0;
        for (_, rank) in self.merged_entries() {
            distinct += 1;
            nonzero_sum += 1.0 / (1u64 << u32::from(rank)) as f64;
        }
        let zeros = m as u32 - distinct;
        estimate::estimate(self.config, zeros, f64::from(zeros) + nonzero_sum)
    }

    fn size_of(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.encoded.capacity()
            + self.buffer.capacity() * (std::mem::size_of::<u32>() + std::mem::size_of::<u8>())
    }
}

/// Decodes `(index, rank)` pairs out of an encoded stream.
pub(crate) struct EntryIter<'a> {
    stream: &'a [u8],
    pos: usize,
    prev: u32,
    first: bool,
}

impl<'a> EntryIter<'a> {
    fn new(stream: &'a [u8]) -> Self {
        Self {
            stream,
            pos: 0,
            prev: 0,
            first: true,
        }
    }
}

impl Iterator for EntryIter<'_> {
    type Item = (u32, u8);

    fn next(&mut self) -> Option<(u32, u8)> {
        if self.pos >= self.stream.len() {
            return None;
        }
        // The stream is produced by `encode_entries`, so both varints are
        // present and well-formed.
        let delta = codec::read_varint(self.stream, &mut self.pos)?;
        let rank = codec::read_varint(self.stream, &mut self.pos)?;
        let index = if self.first { delta } else { self.prev + delta };
        self.first = false;
        self.prev = index;
        Some((index, rank as u8))
    }
}

/// Index-ascending union of two sorted entry streams, taking the maximum rank
/// when both sides hold the same index.
pub(crate) struct UnionIter<A, B>
where
    A: Iterator<Item = (u32, u8)>,
    B: Iterator<Item = (u32, u8)>,
{
    a: Peekable<A>,
    b: Peekable<B>,
}

impl<A, B> UnionIter<A, B>
where
    A: Iterator<Item = (u32, u8)>,
    B: Iterator<Item = (u32, u8)>,
{
    pub(crate) fn new(a: A, b: B) -> Self {
        Self {
            a: a.peekable(),
            b: b.peekable(),
        }
    }
}

impl<A, B> Iterator for UnionIter<A, B>
where
    A: Iterator<Item = (u32, u8)>,
    B: Iterator<Item = (u32, u8)>,
{
    type Item = (u32, u8);

    fn next(&mut self) -> Option<(u32, u8)> {
        match (self.a.peek().copied(), self.b.peek().copied()) {
            (None, None) => None,
            (Some(_), None) => self.a.next(),
            (None, Some(_)) => self.b.next(),
            (Some((ai, ar)), Some((bi, br))) => {
                if ai < bi {
                    self.a.next()
                } else if bi < ai {
                    self.b.next()
                } else {
                    self.a.next();
                    self.b.next();
                    Some((ai, ar.max(br)))
                }
            }
        }
    }
}

pub(crate) type MergedEntries<'a> = UnionIter<EntryIter<'a>, std::vec::IntoIter<(u32, u8)>>;

/// Encode an index-ascending entry stream, returning the stream and its
/// entry count.
fn encode_entries<I: Iterator<Item = (u32, u8)>>(pairs: I) -> (Vec<u8>, usize) {
    let mut stream = Vec::new();
    let mut count = 0;
    let mut prev = 0;
    for (index, rank) in pairs {
        debug_assert!(count == 0 || index > prev);
        let delta = if count == 0 { index } else { index - prev };
        codec::write_varint(&mut stream, delta);
        codec::write_varint(&mut stream, u32::from(rank));
        prev = index;
        count += 1;
    }
    (stream, count)
}
