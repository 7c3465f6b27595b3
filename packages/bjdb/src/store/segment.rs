//! Immutable run of committed records.
//!
//! Every commit seals the write buffer into one segment. Segments cover
//! disjoint, contiguous position ranges and are shared between snapshots
//! through `Arc`, so publishing a new snapshot never copies records.

use std::ops::Range;
use std::sync::Arc;

use crate::record::{Position, Record};

#[derive(Debug)]
pub struct Segment {
    /// Position of `records[0]`.
    base: usize,
    records: Vec<Record>,
}

impl Segment {
    pub fn new(base: usize, records: Vec<Record>) -> Self {
        Self { base, records }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the last position in this segment.
    pub fn end(&self) -> usize {
        self.base + self.records.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.base..self.end()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, pos: Position) -> Option<&Record> {
        pos.as_usize()
            .checked_sub(self.base)
            .and_then(|idx| self.records.get(idx))
    }

    /// Records whose positions fall in `range`, clipped to this segment.
    /// Returns the first position of the slice alongside it.
    pub fn slice(&self, range: Range<usize>) -> (usize, &[Record]) {
        let start = range.start.clamp(self.base, self.end());
        let end = range.end.clamp(start, self.end());
        (start, &self.records[start - self.base..end - self.base])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &Record)> {
        let base = self.base;
        self.records
            .iter()
            .enumerate()
            .map(move |(i, r)| (Position::from_usize(base + i), r))
    }
}

/// Find the record at `pos` in a list of segments ordered by base.
/// O(log S) in the number of segments.
pub fn locate(segments: &[Arc<Segment>], pos: Position) -> Option<&Record> {
    let p = pos.as_usize();
    let idx = segments.partition_point(|seg| seg.end() <= p);
    segments.get(idx).and_then(|seg| seg.get(pos))
}
