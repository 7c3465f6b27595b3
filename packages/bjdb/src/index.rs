//! BlockJoinIndex - single-writer, multi-reader block-join index
//!
//! # Architecture
//!
//! - Writer state (record store + pending tombstones) sits behind a `Mutex`,
//!   so every block write is a critical section and blocks never interleave
//! - The published view is an `RwLock<Arc<Snapshot>>`; commit builds the
//!   next snapshot off to the side and swaps the `Arc`
//! - Readers clone the `Arc` and query without holding any lock
//!
//! # Usage
//!
//! ```no_run
//! use bjdb::{BlockJoinIndex, BlockJoinQuery, Predicate, Record};
//!
//! let index = BlockJoinIndex::new();
//! let marker = index.config().parent_marker.clone();
//!
//! index.write_block(
//!     vec![Record::new().with("color", "blue").with("size", "small")],
//!     marker.stamp(Record::new().with("name", "wolf")),
//! ).unwrap();
//! index.commit();
//!
//! let hits = index.find_parents_matching(
//!     &BlockJoinQuery::new(Predicate::term("color", "blue")),
//! );
//! assert_eq!(hits.total_hits, 1);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::Serialize;

use crate::block_writer::BlockWriter;
use crate::config::IndexConfig;
use crate::error::Result;
use crate::ingest::BlockDocument;
use crate::predicate::Predicate;
use crate::query::{BlockJoinQuery, SearchResults};
use crate::record::{Position, Record};
use crate::snapshot::{Snapshot, SnapshotStats};
use crate::store::RecordStore;

/// Committed stats plus what is waiting for the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    #[serde(flatten)]
    pub committed: SnapshotStats,
    pub pending_records: usize,
    pub pending_deletes: usize,
}

struct WriterState {
    store: RecordStore,
    /// Parents to tombstone at the next commit.
    pending_deletes: Vec<Position>,
}

pub struct BlockJoinIndex {
    config: Arc<IndexConfig>,
    writer: Mutex<WriterState>,
    current: RwLock<Arc<Snapshot>>,
}

impl BlockJoinIndex {
    /// Index with the default configuration.
    pub fn new() -> Self {
        Self::build(Arc::new(IndexConfig::default()))
    }

    pub fn with_config(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(Arc::new(config)))
    }

    fn build(config: Arc<IndexConfig>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty(Arc::clone(&config)))),
            writer: Mutex::new(WriterState {
                store: RecordStore::new(),
                pending_deletes: Vec::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn lock_writer(&self) -> MutexGuard<'_, WriterState> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Write Operations -----------------------------------------------------

    /// Append one block; visible after the next [`commit`](Self::commit).
    pub fn write_block(&self, children: Vec<Record>, parent: Record) -> Result<Position> {
        let mut w = self.lock_writer();
        BlockWriter::new(&mut w.store, &self.config.parent_marker).write_block(children, parent)
    }

    /// Append several blocks, all or nothing.
    pub fn write_blocks(&self, blocks: Vec<BlockDocument>) -> Result<Vec<Position>> {
        let mut w = self.lock_writer();
        BlockWriter::new(&mut w.store, &self.config.parent_marker).write_blocks(blocks)
    }

    /// Tombstone a committed block at the next commit.
    pub fn delete_block(&self, parent: Position) -> Result<()> {
        let mut w = self.lock_writer();
        self.snapshot().check_parent(parent)?;
        if !w.pending_deletes.contains(&parent) {
            w.pending_deletes.push(parent);
        }
        Ok(())
    }

    /// Write a new block and tombstone `old_parent`'s block. Both become
    /// visible together at the next commit. Nothing changes on error.
    pub fn replace_block(
        &self,
        old_parent: Position,
        children: Vec<Record>,
        parent: Record,
    ) -> Result<Position> {
        let mut w = self.lock_writer();
        self.snapshot().check_parent(old_parent)?;
        let new_parent =
            BlockWriter::new(&mut w.store, &self.config.parent_marker).write_block(children, parent)?;
        if !w.pending_deletes.contains(&old_parent) {
            w.pending_deletes.push(old_parent);
        }
        Ok(new_parent)
    }

    /// Publish everything written since the last commit as a new snapshot.
    /// Returns the current snapshot unchanged if nothing was pending.
    pub fn commit(&self) -> Arc<Snapshot> {
        let mut w = self.lock_writer();
        let segment = w.store.commit();
        if segment.is_none() && w.pending_deletes.is_empty() {
            return self.snapshot();
        }
        let deletes = std::mem::take(&mut w.pending_deletes);

        let next = Arc::new(self.snapshot().advance(segment, &deletes));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);

        tracing::debug!(
            generation = next.generation(),
            records = next.len(),
            deleted = deletes.len(),
            "committed snapshot"
        );
        next
    }

    /// Discard uncommitted records and tombstones. Returns the number of
    /// records dropped.
    pub fn rollback(&self) -> usize {
        let mut w = self.lock_writer();
        w.pending_deletes.clear();
        let dropped = w.store.rollback();
        if dropped > 0 {
            tracing::debug!(dropped, "rolled back uncommitted records");
        }
        dropped
    }

    // -- Read Operations ------------------------------------------------------

    /// Latest committed snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, pos: Position) -> Result<Record> {
        self.snapshot().get(pos).cloned()
    }

    /// Owned copy of a committed block.
    pub fn block_of(&self, parent: Position) -> Result<BlockDocument> {
        let snapshot = self.snapshot();
        let view = snapshot.block(parent)?;
        Ok(BlockDocument::new(
            view.parent.clone(),
            view.children.iter().map(|(_, r)| (*r).clone()).collect(),
        ))
    }

    pub fn find_parents_matching(&self, query: &BlockJoinQuery) -> SearchResults {
        self.snapshot().find_parents_matching(query)
    }

    pub fn find_children_of(&self, parent: Position, child: &Predicate) -> Result<Vec<Position>> {
        self.snapshot().find_children_of(parent, child)
    }

    pub fn stats(&self) -> IndexStats {
        let w = self.lock_writer();
        IndexStats {
            committed: self.snapshot().stats(),
            pending_records: w.store.pending_len(),
            pending_deletes: w.pending_deletes.len(),
        }
    }
}

impl Default for BlockJoinIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockJoinError;

    fn index() -> BlockJoinIndex {
        BlockJoinIndex::with_config(IndexConfig::default().with_parent_marker("docType", "shirt"))
            .unwrap()
    }

    fn shirt(name: &str) -> Record {
        Record::new().with("docType", "shirt").with("name", name)
    }

    fn variant(color: &str, size: &str) -> Record {
        Record::new().with("color", color).with("size", size)
    }

    #[test]
    fn test_writes_invisible_until_commit() {
        let index = index();
        let wolf = index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();

        let q = BlockJoinQuery::new(Predicate::term("color", "blue"));
        assert!(index.find_parents_matching(&q).is_empty());
        assert!(matches!(index.get(wolf), Err(BlockJoinError::NotFound(_))));

        let snap = index.commit();
        assert_eq!(snap.generation(), 1);
        assert_eq!(index.find_parents_matching(&q).positions(), vec![wolf]);
        assert_eq!(index.get(wolf).unwrap().get("name"), Some("wolf"));
    }

    #[test]
    fn test_empty_commit_keeps_generation() {
        let index = index();
        assert_eq!(index.commit().generation(), 0);
        index.write_block(vec![], shirt("bare")).unwrap();
        assert_eq!(index.commit().generation(), 1);
        assert_eq!(index.commit().generation(), 1);
    }

    #[test]
    fn test_held_snapshot_is_stable() {
        let index = index();
        index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        let before = index.commit();

        index.write_block(vec![variant("blue", "medium")], shirt("dog")).unwrap();
        let after = index.commit();

        let q = BlockJoinQuery::new(Predicate::term("color", "blue"));
        assert_eq!(before.find_parents_matching(&q).total_hits, 1);
        assert_eq!(after.find_parents_matching(&q).total_hits, 2);
    }

    #[test]
    fn test_delete_block_applies_at_commit() {
        let index = index();
        let wolf = index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        index.commit();

        index.delete_block(wolf).unwrap();
        index.delete_block(wolf).unwrap();
        assert_eq!(index.stats().pending_deletes, 1);

        let q = BlockJoinQuery::new(Predicate::term("color", "blue"));
        assert_eq!(index.find_parents_matching(&q).total_hits, 1);

        index.commit();
        assert!(index.find_parents_matching(&q).is_empty());
        assert!(matches!(index.block_of(wolf), Err(BlockJoinError::NotFound(_))));
        assert!(matches!(index.delete_block(wolf), Err(BlockJoinError::NotFound(_))));
    }

    #[test]
    fn test_delete_child_position_invalid_parent() {
        let index = index();
        index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        index.commit();
        assert!(matches!(index.delete_block(Position(0)), Err(BlockJoinError::InvalidParent(_))));
    }

    #[test]
    fn test_replace_block() {
        let index = index();
        let wolf = index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        index.commit();

        let new_wolf = index
            .replace_block(wolf, vec![variant("blue", "medium")], shirt("wolf"))
            .unwrap();
        assert_eq!(new_wolf, Position(3));

        let medium = BlockJoinQuery::new(Predicate::terms([("color", "blue"), ("size", "medium")]));
        let small = BlockJoinQuery::new(Predicate::terms([("color", "blue"), ("size", "small")]));
        assert!(index.find_parents_matching(&medium).is_empty());

        index.commit();
        assert_eq!(index.find_parents_matching(&medium).positions(), vec![new_wolf]);
        assert!(index.find_parents_matching(&small).is_empty());
    }

    #[test]
    fn test_replace_with_invalid_block_changes_nothing() {
        let index = index();
        let wolf = index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        index.commit();

        let err = index
            .replace_block(wolf, vec![], Record::new().with("name", "wolf"))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_BLOCK");
        let stats = index.stats();
        assert_eq!(stats.pending_records, 0);
        assert_eq!(stats.pending_deletes, 0);
    }

    #[test]
    fn test_rollback() {
        let index = index();
        index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        index.commit();

        index.write_block(vec![variant("red", "large")], shirt("dog")).unwrap();
        index.delete_block(Position(1)).unwrap();
        assert_eq!(index.rollback(), 2);

        let snap = index.commit();
        assert_eq!(snap.generation(), 1);
        assert_eq!(snap.len(), 2);
        assert!(!snap.is_deleted(Position(1)));
    }

    #[test]
    fn test_block_returns_owned_copy() {
        let index = index();
        let dog = index
            .write_block(vec![variant("blue", "small"), variant("red", "medium")], shirt("dog"))
            .unwrap();
        index.commit();

        let block = index.block_of(dog).unwrap();
        assert_eq!(block.parent.get("name"), Some("dog"));
        assert_eq!(block.children, vec![variant("blue", "small"), variant("red", "medium")]);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = IndexConfig::default().with_parent_marker("", "x");
        assert!(BlockJoinIndex::with_config(config).is_err());
    }

    #[test]
    fn test_stats() {
        let index = index();
        index.write_block(vec![variant("blue", "small")], shirt("wolf")).unwrap();
        index.commit();
        index.write_block(vec![], shirt("bare")).unwrap();

        let stats = index.stats();
        assert_eq!(stats.committed.records, 2);
        assert_eq!(stats.committed.parents, 1);
        assert_eq!(stats.pending_records, 1);

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["records"], 2);
        assert_eq!(json["pending_records"], 1);
    }
}
