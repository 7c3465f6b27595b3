//! Immutable committed view of the index.
//!
//! A snapshot owns everything a query needs: the sealed segments, the
//! parent filter built for exactly those segments, and the tombstones
//! committed with them. Commit builds the next snapshot from the previous
//! one and the index swaps the reference; readers holding an older
//! `Arc<Snapshot>` keep a consistent view for as long as they hold it.

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{IndexConfig, ParentMarker};
use crate::error::{BlockJoinError, Result};
use crate::parent_filter::ParentFilter;
use crate::predicate::Predicate;
use crate::query::{self, BlockJoinQuery, ScoreMode, SearchResults};
use crate::record::{Position, Record};
use crate::store::segment::{self, Segment};
use crate::store::TombstoneSet;

/// Parent record of a block together with its children.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockView<'a> {
    pub parent_position: Position,
    pub parent: &'a Record,
    pub children: Vec<(Position, &'a Record)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub generation: u64,
    pub records: usize,
    pub parents: usize,
    pub children: usize,
    pub deleted_blocks: usize,
    pub segments: usize,
}

pub struct Snapshot {
    /// Commit counter. Generation 0 is the empty snapshot.
    generation: u64,
    segments: Vec<Arc<Segment>>,
    /// Committed record count; every position below it is visible.
    len: usize,
    parents: Arc<ParentFilter>,
    tombstones: Arc<TombstoneSet>,
    config: Arc<IndexConfig>,
}

impl Snapshot {
    pub fn empty(config: Arc<IndexConfig>) -> Self {
        Self {
            generation: 0,
            segments: Vec::new(),
            len: 0,
            parents: Arc::new(ParentFilter::new()),
            tombstones: Arc::new(TombstoneSet::new()),
            config,
        }
    }

    /// Next generation: this view plus `segment` and `deleted` parents.
    ///
    /// The parent filter is extended into a fresh copy and the tombstone set
    /// is only copied when it changes; untouched parts stay shared.
    pub fn advance(&self, segment: Option<Arc<Segment>>, deleted: &[Position]) -> Snapshot {
        let mut segments = self.segments.clone();
        let mut len = self.len;
        let parents = match segment {
            Some(seg) => {
                debug_assert_eq!(seg.base(), self.len, "segments must be contiguous");
                len = seg.end();
                let filter = self
                    .parents
                    .extended(seg.iter().map(|(_, r)| r), &self.config.parent_marker);
                segments.push(seg);
                Arc::new(filter)
            }
            None => Arc::clone(&self.parents),
        };
        let tombstones = if deleted.is_empty() {
            Arc::clone(&self.tombstones)
        } else {
            let mut next = (*self.tombstones).clone();
            next.extend(deleted.iter().copied());
            Arc::new(next)
        };
        Snapshot {
            generation: self.generation + 1,
            segments,
            len,
            parents,
            tombstones,
            config: Arc::clone(&self.config),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn parent_filter(&self) -> &ParentFilter {
        &self.parents
    }

    /// Shared handle to the filter, e.g. to cache it across snapshots.
    pub fn parent_filter_handle(&self) -> Arc<ParentFilter> {
        Arc::clone(&self.parents)
    }

    pub fn tombstones(&self) -> &TombstoneSet {
        &self.tombstones
    }

    pub fn marker(&self) -> &ParentMarker {
        &self.config.parent_marker
    }

    pub fn default_score_mode(&self) -> ScoreMode {
        self.config.default_score_mode
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    // -- Record Access --------------------------------------------------------

    /// Committed record at `pos`. Tombstoned records are still readable by
    /// position; block-level accessors hide them.
    pub fn get(&self, pos: Position) -> Result<&Record> {
        if pos.as_usize() >= self.len {
            return Err(BlockJoinError::NotFound(pos));
        }
        segment::locate(&self.segments, pos).ok_or(BlockJoinError::NotFound(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &Record)> {
        self.segments.iter().flat_map(|seg| seg.iter())
    }

    #[inline]
    pub fn is_parent(&self, pos: Position) -> bool {
        self.parents.is_parent(pos)
    }

    #[inline]
    pub fn is_deleted(&self, parent: Position) -> bool {
        self.tombstones.contains(parent)
    }

    /// Parent owning the block that contains `pos` (itself for a parent).
    pub fn owner_of(&self, pos: Position) -> Option<Position> {
        self.parents.next_parent_at_or_after(pos)
    }

    /// Parents of live (non-tombstoned) blocks, ascending.
    pub fn live_parents(&self) -> impl Iterator<Item = Position> + '_ {
        self.parents.parents().filter(move |p| !self.is_deleted(*p))
    }

    // -- Blocks ---------------------------------------------------------------

    /// `NotFound` outside the committed range or for a tombstoned block,
    /// `InvalidParent` for a child position.
    pub fn check_parent(&self, parent: Position) -> Result<()> {
        if parent.as_usize() >= self.len || self.is_deleted(parent) {
            return Err(BlockJoinError::NotFound(parent));
        }
        if !self.is_parent(parent) {
            return Err(BlockJoinError::InvalidParent(parent));
        }
        Ok(())
    }

    /// Child positions of the block ending at `parent`:
    /// `[previous parent + 1, parent)`.
    pub fn children_range(&self, parent: Position) -> Result<Range<usize>> {
        self.check_parent(parent)?;
        let start = self
            .parents
            .prev_parent_before(parent)
            .map_or(0, |prev| prev.as_usize() + 1);
        Ok(start..parent.as_usize())
    }

    pub fn block(&self, parent: Position) -> Result<BlockView<'_>> {
        let range = self.children_range(parent)?;
        let mut children = Vec::with_capacity(range.len());
        for p in range {
            let pos = Position::from_usize(p);
            children.push((pos, self.get(pos)?));
        }
        Ok(BlockView {
            parent_position: parent,
            parent: self.get(parent)?,
            children,
        })
    }

    // -- Queries --------------------------------------------------------------

    pub fn find_parents_matching(&self, query: &BlockJoinQuery) -> SearchResults {
        query::find_parents_matching(self, query)
    }

    pub fn find_children_of(&self, parent: Position, child: &Predicate) -> Result<Vec<Position>> {
        query::find_children_of(self, parent, child)
    }

    /// Score every record in `range` accepted by `keep` against `predicate`.
    /// Results are in ascending position order. Ranges at or above the
    /// configured threshold are evaluated in parallel.
    pub(crate) fn evaluate<F>(
        &self,
        range: Range<usize>,
        predicate: &Predicate,
        keep: F,
    ) -> Vec<(Position, f32)>
    where
        F: Fn(Position, &Record) -> bool + Sync,
    {
        let range = range.start..range.end.min(self.len);
        let parallel = range.len() >= self.config.parallel_threshold;
        let mut out = Vec::new();

        let first = self.segments.partition_point(|seg| seg.end() <= range.start);
        for seg in &self.segments[first..] {
            if seg.base() >= range.end {
                break;
            }
            let (start, records) = seg.slice(range.clone());
            let score_one = |i: usize, record: &Record| -> Option<(Position, f32)> {
                let pos = Position::from_usize(start + i);
                if !keep(pos, record) {
                    return None;
                }
                predicate.score(record).map(|score| (pos, score))
            };
            if parallel {
                out.par_extend(
                    records
                        .par_iter()
                        .enumerate()
                        .filter_map(|(i, r)| score_one(i, r)),
                );
            } else {
                out.extend(records.iter().enumerate().filter_map(|(i, r)| score_one(i, r)));
            }
        }
        out
    }

    pub fn stats(&self) -> SnapshotStats {
        let parents = self.parents.parent_count();
        SnapshotStats {
            generation: self.generation,
            records: self.len,
            parents,
            children: self.len - parents,
            deleted_blocks: self.tombstones.len(),
            segments: self.segments.len(),
        }
    }
}
