//! Block writer: appends a parent and its children as one contiguous run.
//!
//! Layout per block: `[child_1 .. child_k, parent]`. The parent is always
//! last so "nearest parent at or after a child" identifies its owner.
//!
//! Validation happens before the first append. A rejected block (or a
//! rejected batch) leaves the store exactly as it was, so no orphaned
//! children can ever reach a commit.

use crate::config::ParentMarker;
use crate::error::{BlockJoinError, Result};
use crate::ingest::BlockDocument;
use crate::record::{Position, Record};
use crate::store::RecordStore;

/// Check block shape: parent carries the marker, no child does.
pub fn validate_block(children: &[Record], parent: &Record, marker: &ParentMarker) -> Result<()> {
    if !marker.matches(parent) {
        return Err(BlockJoinError::InvalidBlock(format!(
            "parent record is missing marker {}={}",
            marker.field, marker.value
        )));
    }
    if let Some(idx) = children.iter().position(|c| marker.matches(c)) {
        return Err(BlockJoinError::InvalidBlock(format!(
            "child {} carries parent marker {}={}",
            idx, marker.field, marker.value
        )));
    }
    Ok(())
}

/// Borrowing writer over a store. Callers serialise access (the index holds
/// its store behind a mutex), which makes each block a critical section.
pub struct BlockWriter<'a> {
    store: &'a mut RecordStore,
    marker: &'a ParentMarker,
}

impl<'a> BlockWriter<'a> {
    pub fn new(store: &'a mut RecordStore, marker: &'a ParentMarker) -> Self {
        Self { store, marker }
    }

    /// Append `children` in order, then `parent`. Returns the parent position.
    ///
    /// An empty `children` list is a valid degenerate block.
    pub fn write_block(&mut self, children: Vec<Record>, parent: Record) -> Result<Position> {
        if let Err(e) = validate_block(&children, &parent, self.marker) {
            tracing::warn!(error = %e, "rejected block");
            return Err(e);
        }
        Ok(self.append_block(children, parent))
    }

    /// Write several blocks. Every block is validated before anything is
    /// appended; one malformed block rejects the whole batch.
    pub fn write_blocks(&mut self, blocks: Vec<BlockDocument>) -> Result<Vec<Position>> {
        for (i, block) in blocks.iter().enumerate() {
            if let Err(e) = validate_block(&block.children, &block.parent, self.marker) {
                tracing::warn!(block = i, error = %e, "rejected batch");
                return Err(e);
            }
        }
        Ok(blocks
            .into_iter()
            .map(|block| self.append_block(block.children, block.parent))
            .collect())
    }

    fn append_block(&mut self, children: Vec<Record>, parent: Record) -> Position {
        for child in children {
            self.store.append(child);
        }
        self.store.append(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> ParentMarker {
        ParentMarker::new("docType", "shirt")
    }

    fn shirt(name: &str) -> Record {
        Record::new().with("docType", "shirt").with("name", name)
    }

    fn variant(color: &str, size: &str) -> Record {
        Record::new().with("color", color).with("size", size)
    }

    #[test]
    fn test_parent_lands_after_children() {
        let mut store = RecordStore::new();
        let marker = marker();
        let mut writer = BlockWriter::new(&mut store, &marker);

        let wolf = writer
            .write_block(vec![variant("blue", "small"), variant("green", "medium")], shirt("wolf"))
            .unwrap();
        let dog = writer.write_block(vec![variant("red", "medium")], shirt("dog")).unwrap();

        assert_eq!(wolf, Position(2));
        assert_eq!(dog, Position(4));
        assert_eq!(store.next_position(), Position(5));

        store.commit();
        assert_eq!(store.get(Position(0)).unwrap().get("color"), Some("blue"));
        assert_eq!(store.get(Position(2)).unwrap().get("name"), Some("wolf"));
    }

    #[test]
    fn test_empty_children_allowed() {
        let mut store = RecordStore::new();
        let marker = marker();
        let pos = BlockWriter::new(&mut store, &marker)
            .write_block(vec![], shirt("bare"))
            .unwrap();
        assert_eq!(pos, Position(0));
        assert_eq!(store.pending_len(), 1);
    }

    #[test]
    fn test_missing_marker_appends_nothing() {
        let mut store = RecordStore::new();
        let marker = marker();
        let err = BlockWriter::new(&mut store, &marker)
            .write_block(vec![variant("blue", "small")], Record::new().with("name", "wolf"))
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_BLOCK");
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.next_position(), Position(0));
    }

    #[test]
    fn test_child_with_marker_rejected() {
        let mut store = RecordStore::new();
        let marker = marker();
        let err = BlockWriter::new(&mut store, &marker)
            .write_block(vec![variant("blue", "small"), shirt("imposter")], shirt("wolf"))
            .unwrap_err();

        assert!(err.to_string().contains("child 1 carries parent marker"), "unexpected error: {}", err);
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut store = RecordStore::new();
        let marker = marker();
        let blocks = vec![
            BlockDocument::new(shirt("wolf"), vec![variant("blue", "small")]),
            BlockDocument::new(Record::new().with("name", "nameless"), vec![]),
        ];
        assert!(BlockWriter::new(&mut store, &marker).write_blocks(blocks).is_err());
        assert_eq!(store.pending_len(), 0);

        let blocks = vec![
            BlockDocument::new(shirt("wolf"), vec![variant("blue", "small")]),
            BlockDocument::new(shirt("dog"), vec![variant("red", "medium"), variant("blue", "small")]),
        ];
        let parents = BlockWriter::new(&mut store, &marker).write_blocks(blocks).unwrap();
        assert_eq!(parents, vec![Position(1), Position(4)]);
    }
}
