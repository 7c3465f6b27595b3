//! In-memory write buffer for records appended since the last commit.
//!
//! Analogous to an LSM-tree memtable, except nothing is keyed or sorted:
//! records sit in append order and their positions are `base + index`.
//! NOT Send+Sync on its own terms -- single-writer access assumed, the
//! index wraps it in a mutex.

use crate::record::{Position, Record};

/// Uncommitted records, positioned right after the last committed one.
pub struct WriteBuffer {
    /// Position of the first buffered record.
    base: usize,

    /// Records in append order.
    records: Vec<Record>,
}

impl WriteBuffer {
    // -- Constructors ---------------------------------------------------------

    /// Create an empty buffer whose first record will land at `base`.
    pub fn new(base: usize) -> Self {
        Self {
            base,
            records: Vec::new(),
        }
    }

    // -- Write Operations -----------------------------------------------------

    /// Append a record, returning the position it will have once committed.
    pub fn push(&mut self, record: Record) -> Position {
        let pos = Position::from_usize(self.base + self.records.len());
        self.records.push(record);
        pos
    }

    // -- Buffer Management ----------------------------------------------------

    pub fn base(&self) -> usize {
        self.base
    }

    /// Position the next pushed record will get.
    pub fn next_position(&self) -> usize {
        self.base + self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove and return all records. The buffer moves its base past them,
    /// so the next push continues the position sequence.
    pub fn drain(&mut self) -> (usize, Vec<Record>) {
        let base = self.base;
        let records = std::mem::take(&mut self.records);
        self.base += records.len();
        (base, records)
    }

    /// Drop all buffered records without advancing the base.
    pub fn discard(&mut self) -> usize {
        let n = self.records.len();
        self.records.clear();
        n
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new(0)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(sku: &str) -> Record {
        Record::new().with("sku", sku)
    }

    #[test]
    fn test_empty_buffer() {
        let buf = WriteBuffer::new(0);
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.next_position(), 0);
    }

    #[test]
    fn test_push_assigns_positions_from_base() {
        let mut buf = WriteBuffer::new(10);
        assert_eq!(buf.push(make_record("1")), Position(10));
        assert_eq!(buf.push(make_record("2")), Position(11));
        assert_eq!(buf.next_position(), 12);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_drain_advances_base() {
        let mut buf = WriteBuffer::new(0);
        buf.push(make_record("1"));
        buf.push(make_record("2"));

        let (base, records) = buf.drain();
        assert_eq!(base, 0);
        assert_eq!(records[1].get("sku"), Some("2"));
        assert!(buf.is_empty());
        assert_eq!(buf.base(), 2);
        assert_eq!(buf.push(make_record("3")), Position(2));
    }

    #[test]
    fn test_discard_keeps_base() {
        let mut buf = WriteBuffer::new(5);
        buf.push(make_record("1"));
        buf.push(make_record("2"));

        assert_eq!(buf.discard(), 2);
        assert!(buf.is_empty());
        assert_eq!(buf.push(make_record("3")), Position(5));
    }
}
