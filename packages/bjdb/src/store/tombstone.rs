//! Tombstone state for committed blocks.
//!
//! The store is append-only, so deleting or replacing a block never touches
//! its records. Instead the block's parent position is recorded here and
//! every query path skips tombstoned blocks (parent and children alike).
//! O(1) per check via HashSet.

use std::collections::HashSet;

use crate::record::Position;

#[derive(Debug, Clone, Default)]
pub struct TombstoneSet {
    /// Parent positions of superseded blocks.
    parents: HashSet<Position>,
}

impl TombstoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, parent: Position) -> bool {
        self.parents.contains(&parent)
    }

    /// Returns false if the block was already tombstoned.
    pub fn insert(&mut self, parent: Position) -> bool {
        self.parents.insert(parent)
    }

    /// Union with existing tombstones.
    pub fn extend(&mut self, parents: impl IntoIterator<Item = Position>) {
        self.parents.extend(parents);
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}
