//! Parent → matching children lookup.
//!
//! The block join folds children into their parent, so it cannot say which
//! children matched. Given one parent, this re-runs the child predicate over
//! just that parent's block: `[previous parent + 1, parent)`.

use crate::error::Result;
use crate::predicate::Predicate;
use crate::record::Position;
use crate::snapshot::Snapshot;

/// Matching child positions under `parent`, ascending.
///
/// `InvalidParent` if `parent` is a child position, `NotFound` if it is out
/// of the committed range or its block was tombstoned.
pub fn find_children_of(
    snapshot: &Snapshot,
    parent: Position,
    child: &Predicate,
) -> Result<Vec<Position>> {
    let range = snapshot.children_range(parent)?;
    let matches = snapshot.evaluate(range, child, |_, _| true);
    Ok(matches.into_iter().map(|(pos, _)| pos).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::block_writer::BlockWriter;
    use crate::config::IndexConfig;
    use crate::error::BlockJoinError;
    use crate::record::Record;
    use crate::store::RecordStore;

    fn variant(color: &str, size: &str) -> Record {
        Record::new().with("color", color).with("size", size)
    }

    /// wolf = 3, dog = 6, bare = 7
    fn snapshot() -> Snapshot {
        let config = Arc::new(IndexConfig::default());
        let marker = config.parent_marker.clone();
        let mut store = RecordStore::new();
        {
            let mut writer = BlockWriter::new(&mut store, &marker);
            writer
                .write_block(
                    vec![variant("blue", "small"), variant("green", "medium"), variant("yellow", "large")],
                    marker.stamp(Record::new().with("name", "wolf")),
                )
                .unwrap();
            writer
                .write_block(
                    vec![variant("blue", "small"), variant("red", "medium")],
                    marker.stamp(Record::new().with("name", "dog")),
                )
                .unwrap();
            writer
                .write_block(vec![], marker.stamp(Record::new().with("name", "bare")))
                .unwrap();
        }
        Snapshot::empty(config).advance(store.commit(), &[])
    }

    #[test]
    fn test_children_restricted_to_block() {
        let snap = snapshot();
        let blue_small = Predicate::terms([("color", "blue"), ("size", "small")]);
        assert_eq!(snap.find_children_of(Position(3), &blue_small).unwrap(), vec![Position(0)]);
        assert_eq!(snap.find_children_of(Position(6), &blue_small).unwrap(), vec![Position(4)]);
    }

    #[test]
    fn test_all_children_ascending() {
        let snap = snapshot();
        let all = find_children_of(&snap, Position(3), &Predicate::MatchAll).unwrap();
        assert_eq!(all, vec![Position(0), Position(1), Position(2)]);
    }

    #[test]
    fn test_parent_without_children() {
        let snap = snapshot();
        assert!(find_children_of(&snap, Position(7), &Predicate::MatchAll).unwrap().is_empty());
    }

    #[test]
    fn test_child_position_is_invalid_parent() {
        let snap = snapshot();
        let err = find_children_of(&snap, Position(4), &Predicate::MatchAll).unwrap_err();
        assert!(matches!(err, BlockJoinError::InvalidParent(Position(4))));
    }

    #[test]
    fn test_out_of_range_not_found() {
        let snap = snapshot();
        let err = find_children_of(&snap, Position(99), &Predicate::MatchAll).unwrap_err();
        assert!(matches!(err, BlockJoinError::NotFound(Position(99))));
    }

    #[test]
    fn test_tombstoned_parent_not_found() {
        let snap = snapshot().advance(None, &[Position(6)]);
        let err = find_children_of(&snap, Position(6), &Predicate::MatchAll).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
