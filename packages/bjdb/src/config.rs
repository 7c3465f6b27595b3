//! Index configuration.
//!
//! Everything has a default; a JSON file may override any subset:
//!
//! ```text
//! {
//!   "parent_marker": {"field": "docType", "value": "shirt"},
//!   "default_score_mode": "avg",
//!   "parallel_threshold": 16384
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BlockJoinError, Result};
use crate::query::ScoreMode;
use crate::record::Record;

/// Default marker field distinguishing parents from children.
pub const DEFAULT_PARENT_FIELD: &str = "docType";

/// Default marker value carried by parent records.
pub const DEFAULT_PARENT_VALUE: &str = "parent";

/// Record count at or above which predicate evaluation fans out over rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 16_384;

/// Reserved field/value pair that classifies a record as a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentMarker {
    pub field: String,
    pub value: String,
}

impl ParentMarker {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// A record is a parent iff it carries the marker value in the marker field.
    #[inline]
    pub fn matches(&self, record: &Record) -> bool {
        record.has_value(&self.field, &self.value)
    }

    /// Return `record` with the marker added, unless already present.
    pub fn stamp(&self, mut record: Record) -> Record {
        if !self.matches(&record) {
            record.add(self.field.clone(), self.value.clone());
        }
        record
    }
}

impl Default for ParentMarker {
    fn default() -> Self {
        Self::new(DEFAULT_PARENT_FIELD, DEFAULT_PARENT_VALUE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub parent_marker: ParentMarker,
    /// Score mode used by queries that don't pick one.
    pub default_score_mode: ScoreMode,
    pub parallel_threshold: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            parent_marker: ParentMarker::default(),
            default_score_mode: ScoreMode::None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl IndexConfig {
    pub fn with_parent_marker(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.parent_marker = ParentMarker::new(field, value);
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.parent_marker.field.is_empty() {
            return Err(BlockJoinError::Config(
                "parent marker field must not be empty".to_string(),
            ));
        }
        if self.parent_marker.value.is_empty() {
            return Err(BlockJoinError::Config(
                "parent marker value must not be empty".to_string(),
            ));
        }
        if self.parallel_threshold == 0 {
            return Err(BlockJoinError::Config(
                "parallel_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
