//! Ingestion documents: one parent with its ordered children.
//!
//! Input is either a JSON array of blocks or JSON Lines (one block per
//! line, blank lines ignored):
//!
//! ```text
//! {"parent": {"name": "wolf"}, "children": [{"color": "blue", "size": "small"}]}
//! ```
//!
//! Converting domain objects into records is the caller's job; this module
//! only carries the already-flat shape into the block writer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ParentMarker;
use crate::error::Result;
use crate::record::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDocument {
    pub parent: Record,
    #[serde(default)]
    pub children: Vec<Record>,
}

impl BlockDocument {
    pub fn new(parent: Record, children: Vec<Record>) -> Self {
        Self { parent, children }
    }

    /// Add the parent marker to the parent record if it lacks it.
    pub fn with_marker(mut self, marker: &ParentMarker) -> Self {
        self.parent = marker.stamp(self.parent);
        self
    }

    /// Records this block occupies (children then parent).
    pub fn record_count(&self) -> usize {
        self.children.len() + 1
    }
}

/// Parse blocks from a JSON array or JSON Lines text.
pub fn parse_blocks(input: &str) -> Result<Vec<BlockDocument>> {
    if input.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(input)?);
    }
    let mut blocks = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        blocks.push(serde_json::from_str(line)?);
    }
    Ok(blocks)
}

pub fn load_blocks(path: &Path) -> Result<Vec<BlockDocument>> {
    let contents = std::fs::read_to_string(path)?;
    let blocks = parse_blocks(&contents)?;
    tracing::debug!(path = %path.display(), blocks = blocks.len(), "loaded blocks");
    Ok(blocks)
}
