//! Tombstone record sources.
//!
//! A source yields encoded `(internal_key, value)` pairs, one per range
//! tombstone, in any order. The aggregator copies record bytes on
//! ingest, so a source only needs to stay alive for the duration of the
//! `add_tombstones` call that consumes it.

use crate::tombstone::RangeTombstone;

/// Cursor over encoded tombstone records.
///
/// Must support rewinding to the first record and forward iteration;
/// `key` and `value` may only be called while `valid` returns true.
pub trait TombstoneSource {
    fn seek_to_first(&mut self);

    fn valid(&self) -> bool;

    fn next(&mut self);

    /// Encoded internal key of the current record.
    fn key(&self) -> &[u8];

    /// Value payload of the current record (the tombstone's end key).
    fn value(&self) -> &[u8];
}

/// In-memory source over pre-encoded records, used by tests and benches
/// and by callers that buffer tombstones before ingestion.
#[derive(Debug)]
pub struct VecSource {
    records: Vec<(Vec<u8>, Vec<u8>)>,
    idx: usize,
}

impl VecSource {
    pub fn new(records: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { records, idx: 0 }
    }

    /// Serialize tombstones into record form.
    pub fn from_tombstones(tombstones: &[RangeTombstone]) -> Self {
        Self::new(
            tombstones
                .iter()
                .map(|t| (t.serialize_key(), t.end_key.clone()))
                .collect(),
        )
    }
}

impl TombstoneSource for VecSource {
    fn seek_to_first(&mut self) {
        self.idx = 0;
    }

    fn valid(&self) -> bool {
        self.idx < self.records.len()
    }

    fn next(&mut self) {
        self.idx += 1;
    }

    fn key(&self) -> &[u8] {
        &self.records[self.idx].0
    }

    fn value(&self) -> &[u8] {
        &self.records[self.idx].1
    }
}
