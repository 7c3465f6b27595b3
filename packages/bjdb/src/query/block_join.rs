//! To-parent block join.
//!
//! 1. Score the child predicate over every committed non-parent record.
//! 2. Map each matching child to its owner: the nearest parent at or after
//!    it in the parent filter.
//! 3. Fold child scores per distinct parent with the score mode.
//! 4. Intersect with the parent predicate, if any.
//!
//! A selective parent predicate is evaluated first so step 2 can drop
//! children of non-matching parents early. Intersection is commutative, so
//! the order only changes cost, never the result.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::parent_filter::ParentFilter;
use crate::query::{BlockJoinQuery, ScoreAccumulator, ScoredParent, SearchResults};
use crate::record::Position;
use crate::snapshot::Snapshot;

/// Run `query` against `snapshot` with the snapshot's own parent filter.
pub fn find_parents_matching(snapshot: &Snapshot, query: &BlockJoinQuery) -> SearchResults {
    find_parents_with_filter(snapshot, snapshot.parent_filter(), query)
}

/// Run `query` with a caller-supplied parent filter (e.g. one cached from
/// an earlier snapshot). A filter covering less than the snapshot is
/// reported through `stale_filter` and only the covered prefix is searched.
pub fn find_parents_with_filter(
    snapshot: &Snapshot,
    filter: &ParentFilter,
    query: &BlockJoinQuery,
) -> SearchResults {
    let started = Instant::now();
    let mode = query.score_mode.unwrap_or_else(|| snapshot.default_score_mode());

    let stale_filter = match filter.check_fresh(snapshot.len()) {
        Ok(()) => false,
        Err(e) => {
            tracing::warn!(error = %e, "block join running on stale parent filter");
            true
        }
    };
    let covered = filter.covered_len().min(snapshot.len());

    // Parent scores for parents passing a selective parent predicate.
    let parent_first: Option<HashMap<Position, f32>> = match &query.parent {
        Some(parent) if parent.is_selective() => {
            let matches = snapshot.evaluate(0..covered, parent, |pos, _| {
                filter.is_parent(pos) && !snapshot.is_deleted(pos)
            });
            Some(matches.into_iter().collect())
        }
        _ => None,
    };
    if matches!(&parent_first, Some(allowed) if allowed.is_empty()) {
        return SearchResults {
            stale_filter,
            ..SearchResults::default()
        };
    }

    let child_matches = snapshot.evaluate(0..covered, &query.child, |pos, _| !filter.is_parent(pos));
    let child_hits = child_matches.len();

    // BTreeMap keeps parents in position order for boolean results.
    let mut joined: BTreeMap<Position, ScoreAccumulator> = BTreeMap::new();
    for (child, score) in child_matches {
        // Every covered child has an owner: commits only seal whole blocks.
        let Some(parent) = filter.next_parent_at_or_after(child) else {
            continue;
        };
        if snapshot.is_deleted(parent) {
            continue;
        }
        if let Some(allowed) = &parent_first {
            if !allowed.contains_key(&parent) {
                continue;
            }
        }
        joined.entry(parent).or_default().add(score);
    }

    let mut hits = Vec::with_capacity(joined.len());
    for (parent, acc) in joined {
        let parent_score = match (&query.parent, &parent_first) {
            (None, _) => 0.0,
            (Some(_), Some(allowed)) => allowed.get(&parent).copied().unwrap_or_default(),
            (Some(predicate), None) => {
                match snapshot.get(parent).ok().and_then(|r| predicate.score(r)) {
                    Some(score) => score,
                    None => continue,
                }
            }
        };
        let score = if mode.is_scoring() {
            acc.finish(mode) + parent_score
        } else {
            0.0
        };
        hits.push(ScoredParent {
            position: parent,
            score,
        });
    }

    if mode.is_scoring() {
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
        });
    }

    let total_hits = hits.len();
    if let Some(limit) = query.limit {
        hits.truncate(limit);
    }

    tracing::debug!(
        generation = snapshot.generation(),
        child_hits,
        parents = total_hits,
        score_mode = %mode,
        elapsed_us = started.elapsed().as_micros() as u64,
        "block join"
    );

    SearchResults {
        total_hits,
        hits,
        stale_filter,
    }
}
