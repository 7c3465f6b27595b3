//! BJDB - parent/child block-join index
//!
//! Records are written in blocks: a run of child records followed by their
//! parent. A per-snapshot parent bitset maps any child position to its
//! owning parent, so a query can match on child records and return the
//! distinct parents that own a match, without ever combining values from
//! two different children.

pub mod block_writer;
pub mod config;
pub mod error;
pub mod flatten;
pub mod index;
pub mod ingest;
pub mod parent_filter;
pub mod predicate;
pub mod query;
pub mod record;
pub mod snapshot;
pub mod store;

pub use config::{IndexConfig, ParentMarker};
pub use error::{BlockJoinError, Result};
pub use index::{BlockJoinIndex, IndexStats};
pub use ingest::BlockDocument;
pub use parent_filter::ParentFilter;
pub use predicate::Predicate;
pub use query::{BlockJoinQuery, ScoreMode, ScoredParent, SearchResults};
pub use record::{Position, Record};
pub use snapshot::{BlockView, Snapshot, SnapshotStats};
