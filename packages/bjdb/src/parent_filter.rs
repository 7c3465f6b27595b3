//! Parent filter: one bit per position, set for parent records.
//!
//! Built once per committed snapshot by testing the parent marker on every
//! record of the newly sealed segment. A new snapshot's filter is the
//! previous one cloned and extended, never mutated in place, so a reader
//! holding the old snapshot never sees a half-built filter.
//!
//! Parent lookup is a word scan: "next set bit at or after p" and "last set
//! bit before p" skip 64 positions per step instead of testing records.

use crate::config::ParentMarker;
use crate::error::{BlockJoinError, Result};
use crate::record::{Position, Record};

#[derive(Debug, Clone, Default)]
pub struct ParentFilter {
    bits: Vec<u64>,
    /// Number of positions covered. Bits at or past `len` are always zero.
    len: usize,
    parent_count: usize,
}

impl ParentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter covering `records`, positioned from 0.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a Record>, marker: &ParentMarker) -> Self {
        let mut filter = Self::new();
        filter.extend(records, marker);
        filter
    }

    /// Copy of this filter extended with `records`, which must start at
    /// position [`covered_len`](Self::covered_len).
    pub fn extended<'a>(
        &self,
        records: impl IntoIterator<Item = &'a Record>,
        marker: &ParentMarker,
    ) -> Self {
        let mut next = self.clone();
        next.extend(records, marker);
        next
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>, marker: &ParentMarker) {
        for record in records {
            self.push(marker.matches(record));
        }
    }

    /// Cover one more position.
    pub fn push(&mut self, is_parent: bool) {
        if self.len % 64 == 0 {
            self.bits.push(0);
        }
        if is_parent {
            self.bits[self.len / 64] |= 1u64 << (self.len % 64);
            self.parent_count += 1;
        }
        self.len += 1;
    }

    /// O(1). Positions past the covered range are never parents.
    #[inline]
    pub fn is_parent(&self, pos: Position) -> bool {
        let p = pos.as_usize();
        p < self.len && self.bits[p / 64] & (1u64 << (p % 64)) != 0
    }

    /// Nearest parent at or after `pos`: the owner of a child at `pos`.
    pub fn next_parent_at_or_after(&self, pos: Position) -> Option<Position> {
        let p = pos.as_usize();
        if p >= self.len {
            return None;
        }
        let mut word_idx = p / 64;
        let mut word = self.bits[word_idx] & (!0u64 << (p % 64));
        loop {
            if word != 0 {
                let found = word_idx * 64 + word.trailing_zeros() as usize;
                return Some(Position::from_usize(found));
            }
            word_idx += 1;
            if word_idx >= self.bits.len() {
                return None;
            }
            word = self.bits[word_idx];
        }
    }

    /// Last parent strictly before `pos`: the end of the previous block.
    pub fn prev_parent_before(&self, pos: Position) -> Option<Position> {
        let p = pos.as_usize().min(self.len);
        if p == 0 {
            return None;
        }
        let last = p - 1;
        let mut word_idx = last / 64;
        let bit = last % 64;
        let mask = if bit == 63 { !0u64 } else { (1u64 << (bit + 1)) - 1 };
        let mut word = self.bits[word_idx] & mask;
        loop {
            if word != 0 {
                let found = word_idx * 64 + 63 - word.leading_zeros() as usize;
                return Some(Position::from_usize(found));
            }
            if word_idx == 0 {
                return None;
            }
            word_idx -= 1;
            word = self.bits[word_idx];
        }
    }

    /// Parent positions in ascending order.
    pub fn parents(&self) -> impl Iterator<Item = Position> + '_ {
        self.bits.iter().enumerate().flat_map(|(word_idx, &word)| {
            let mut w = word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(Position::from_usize(word_idx * 64 + bit))
            })
        })
    }

    pub fn covered_len(&self) -> usize {
        self.len
    }

    pub fn parent_count(&self) -> usize {
        self.parent_count
    }

    /// `StaleFilter` if this filter covers fewer than `committed` positions.
    /// Advisory: queries still run over the covered prefix.
    pub fn check_fresh(&self, committed: usize) -> Result<()> {
        if self.len < committed {
            return Err(BlockJoinError::StaleFilter {
                covered: self.len,
                committed,
            });
        }
        Ok(())
    }
}
