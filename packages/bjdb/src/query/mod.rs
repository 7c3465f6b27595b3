//! Block-join queries.
//!
//! - [`find_parents_matching`]: child predicate in, distinct parents out.
//! - [`find_children_of`]: recover which children of one parent matched,
//!   the detail the join aggregates away.

pub mod block_join;
pub mod children;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::predicate::Predicate;
use crate::record::Position;

pub use block_join::{find_parents_matching, find_parents_with_filter};
pub use children::find_children_of;

/// How child scores fold into their parent's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// Boolean membership. Hits come back in position order with score 0.
    #[default]
    None,
    Avg,
    Max,
    Min,
    /// Sum of child scores.
    #[serde(alias = "sum")]
    Total,
}

impl ScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMode::None => "none",
            ScoreMode::Avg => "avg",
            ScoreMode::Max => "max",
            ScoreMode::Min => "min",
            ScoreMode::Total => "total",
        }
    }

    pub fn is_scoring(&self) -> bool {
        !matches!(self, ScoreMode::None)
    }
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ScoreMode::None),
            "avg" => Ok(ScoreMode::Avg),
            "max" => Ok(ScoreMode::Max),
            "min" => Ok(ScoreMode::Min),
            "total" | "sum" => Ok(ScoreMode::Total),
            other => Err(format!("unknown score mode '{}' (none, avg, max, min, total)", other)),
        }
    }
}

/// Running aggregate of one parent's matching child scores.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAccumulator {
    count: u32,
    sum: f32,
    max: f32,
    min: f32,
}

impl Default for ScoreAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            max: f32::NEG_INFINITY,
            min: f32::INFINITY,
        }
    }
}

impl ScoreAccumulator {
    pub fn add(&mut self, score: f32) {
        self.count += 1;
        self.sum += score;
        self.max = self.max.max(score);
        self.min = self.min.min(score);
    }

    /// Number of matching children folded in.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn finish(&self, mode: ScoreMode) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        match mode {
            ScoreMode::None => 0.0,
            ScoreMode::Avg => self.sum / self.count as f32,
            ScoreMode::Max => self.max,
            ScoreMode::Min => self.min,
            ScoreMode::Total => self.sum,
        }
    }
}

/// "Parents having at least one child matching `child`", optionally
/// intersected with a parent-level predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockJoinQuery {
    pub child: Predicate,
    #[serde(default)]
    pub parent: Option<Predicate>,
    /// Falls back to the index's configured default when unset.
    #[serde(default)]
    pub score_mode: Option<ScoreMode>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl BlockJoinQuery {
    pub fn new(child: Predicate) -> Self {
        Self {
            child,
            parent: None,
            score_mode: None,
            limit: None,
        }
    }

    pub fn parent(mut self, parent: Predicate) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn score_mode(mut self, mode: ScoreMode) -> Self {
        self.score_mode = Some(mode);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredParent {
    pub position: Position,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Distinct matching parents, before `limit`.
    pub total_hits: usize,
    /// Ranked by score (descending) then position; position order for
    /// boolean queries.
    pub hits: Vec<ScoredParent>,
    /// The parent filter did not cover the whole snapshot; only the covered
    /// prefix was searched.
    pub stale_filter: bool,
}

impl SearchResults {
    pub fn positions(&self) -> Vec<Position> {
        self.hits.iter().map(|h| h.position).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
