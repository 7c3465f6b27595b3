//! Append-only record store.
//!
//! Write path: append -> write buffer -> commit -> sealed segment
//! Read path:  position -> segment lookup (committed records only)
//!
//! The store knows nothing about parents or blocks; the block writer
//! enforces block layout on top of it and the snapshot adds the parent
//! filter.

pub mod segment;
pub mod tombstone;
pub mod write_buffer;

use std::sync::Arc;

use crate::error::{BlockJoinError, Result};
use crate::record::{Position, Record};

pub use segment::Segment;
pub use tombstone::TombstoneSet;
pub use write_buffer::WriteBuffer;

/// Single-writer record store. Positions are monotonic from 0. A rollback
/// hands the discarded (never visible) positions out again.
pub struct RecordStore {
    /// Sealed segments, ordered by base position.
    segments: Vec<Arc<Segment>>,

    /// Records appended since the last commit.
    buffer: WriteBuffer,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            buffer: WriteBuffer::new(0),
        }
    }

    /// Append a record. It stays invisible until the next [`commit`](Self::commit).
    pub fn append(&mut self, record: Record) -> Position {
        self.buffer.push(record)
    }

    /// Seal everything appended since the last commit into a new segment.
    /// Returns `None` when nothing was pending.
    pub fn commit(&mut self) -> Option<Arc<Segment>> {
        if self.buffer.is_empty() {
            return None;
        }
        let (base, records) = self.buffer.drain();
        let segment = Arc::new(Segment::new(base, records));
        self.segments.push(Arc::clone(&segment));
        Some(segment)
    }

    /// Drop uncommitted records. Returns how many were discarded.
    pub fn rollback(&mut self) -> usize {
        self.buffer.discard()
    }

    /// Committed record at `pos`.
    pub fn get(&self, pos: Position) -> Result<&Record> {
        segment::locate(&self.segments, pos).ok_or(BlockJoinError::NotFound(pos))
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    /// Number of committed records.
    pub fn committed_len(&self) -> usize {
        self.buffer.base()
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Position the next append will get.
    pub fn next_position(&self) -> Position {
        Position::from_usize(self.buffer.next_position())
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
