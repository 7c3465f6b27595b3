//! Property tests: block layout and join results against a brute-force
//! per-block evaluation over randomly generated catalogues.

use bjdb::{BlockDocument, BlockJoinIndex, BlockJoinQuery, Position, Predicate, Record};
use proptest::prelude::*;

const COLORS: [&str; 3] = ["blue", "red", "green"];
const SIZES: [&str; 2] = ["small", "medium"];

fn arb_child() -> impl Strategy<Value = Record> {
    (0..COLORS.len(), 0..SIZES.len())
        .prop_map(|(c, s)| Record::new().with("color", COLORS[c]).with("size", SIZES[s]))
}

fn arb_block() -> impl Strategy<Value = BlockDocument> {
    (prop::collection::vec(arb_child(), 0..5), "[a-z]{1,6}")
        .prop_map(|(children, name)| BlockDocument::new(Record::new().with("name", name), children))
}

/// Blocks written in batches, one commit per batch.
fn arb_batches() -> impl Strategy<Value = Vec<Vec<BlockDocument>>> {
    prop::collection::vec(prop::collection::vec(arb_block(), 1..6), 1..5)
}

fn arb_child_predicate() -> impl Strategy<Value = Predicate> {
    (0..COLORS.len(), prop::option::of(0..SIZES.len())).prop_map(|(c, s)| match s {
        Some(s) => Predicate::terms([("color", COLORS[c]), ("size", SIZES[s])]),
        None => Predicate::term("color", COLORS[c]),
    })
}

fn build(batches: &[Vec<BlockDocument>]) -> BlockJoinIndex {
    let index = BlockJoinIndex::new();
    let marker = index.config().parent_marker.clone();
    for batch in batches {
        let blocks = batch.iter().cloned().map(|b| b.with_marker(&marker)).collect();
        index.write_blocks(blocks).unwrap();
        index.commit();
    }
    index
}

proptest! {
    #[test]
    fn every_block_has_one_parent_last(batches in arb_batches()) {
        let index = build(&batches);
        let snap = index.snapshot();
        let blocks: Vec<&BlockDocument> = batches.iter().flatten().collect();

        let parents: Vec<Position> = snap.live_parents().collect();
        prop_assert_eq!(parents.len(), blocks.len());
        prop_assert_eq!(parents.last().map(|p| p.as_usize() + 1), Some(snap.len()));

        let mut start = 0;
        for (parent, block) in parents.iter().zip(&blocks) {
            prop_assert_eq!(parent.as_usize() - start, block.children.len());
            let view = snap.block(*parent).unwrap();
            prop_assert_eq!(view.children.len(), block.children.len());
            for (pos, _) in &view.children {
                prop_assert!(!snap.is_parent(*pos));
                prop_assert_eq!(snap.owner_of(*pos), Some(*parent));
            }
            start = parent.as_usize() + 1;
        }
    }

    #[test]
    fn join_matches_per_block_evaluation(
        batches in arb_batches(),
        child in arb_child_predicate(),
    ) {
        let index = build(&batches);
        let snap = index.snapshot();
        let parents: Vec<Position> = snap.live_parents().collect();

        let expected: Vec<Position> = batches
            .iter()
            .flatten()
            .zip(&parents)
            .filter(|(block, _)| block.children.iter().any(|c| child.matches(c)))
            .map(|(_, p)| *p)
            .collect();

        let res = snap.find_parents_matching(&BlockJoinQuery::new(child));
        prop_assert_eq!(res.total_hits, expected.len());
        prop_assert_eq!(res.positions(), expected);
    }

    #[test]
    fn children_stay_inside_their_block(
        batches in arb_batches(),
        child in arb_child_predicate(),
    ) {
        let index = build(&batches);
        let snap = index.snapshot();
        let mut prev: Option<Position> = None;
        for parent in snap.live_parents() {
            let found = snap.find_children_of(parent, &child).unwrap();
            for pos in &found {
                prop_assert!(*pos < parent);
                if let Some(prev) = prev {
                    prop_assert!(*pos > prev);
                }
                prop_assert!(child.matches(snap.get(*pos).unwrap()));
            }
            prop_assert!(found.windows(2).all(|w| w[0] < w[1]));
            prev = Some(parent);
        }
    }

    #[test]
    fn match_all_counts_blocks_with_children(batches in arb_batches()) {
        let index = build(&batches);
        let with_children = batches.iter().flatten().filter(|b| !b.children.is_empty()).count();
        let res = index.find_parents_matching(&BlockJoinQuery::new(Predicate::MatchAll));
        prop_assert_eq!(res.total_hits, with_children);
    }
}
