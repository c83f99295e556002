//! Merging cursor across snapshot stripes.
//!
//! Each stripe's map iterates in start-key order on its own; compaction
//! needs the union. [`AggregatorIter`] runs a k-way merge over the
//! per-stripe cursors, ordered by start key ascending with ties broken
//! towards the higher sequence. The stripe count is small (one per open
//! snapshot), so the merge scans children linearly instead of keeping a
//! heap.

use std::cmp::Ordering;

use crate::key::UserKeyOrder;
use crate::tombstone::{RangeTombstone, TombstoneMapIter};

/// Merged view over all stripes of one aggregator.
#[derive(Debug)]
pub struct AggregatorIter<'a> {
    order: UserKeyOrder,
    children: Vec<TombstoneMapIter<'a>>,
}

impl<'a> AggregatorIter<'a> {
    pub(crate) fn new(order: UserKeyOrder, children: Vec<TombstoneMapIter<'a>>) -> Self {
        Self { order, children }
    }

    pub fn valid(&self) -> bool {
        self.children.iter().any(TombstoneMapIter::valid)
    }

    /// The smallest current tombstone across stripes. The cursor must be
    /// valid.
    pub fn tombstone(&self) -> RangeTombstone {
        let child = self
            .min_child()
            .expect("tombstone() requires a valid cursor");
        self.children[child].tombstone()
    }

    pub fn advance(&mut self) {
        if let Some(child) = self.min_child() {
            self.children[child].advance();
        }
    }

    /// Position every stripe at `target`; see
    /// [`TombstoneMapIter::seek`] for the per-stripe semantics.
    ///
    /// # Panics
    /// When any stripe is uncollapsed.
    pub fn seek(&mut self, target: &[u8]) {
        for child in &mut self.children {
            child.seek(target);
        }
    }

    fn min_child(&self) -> Option<usize> {
        let mut best: Option<(usize, RangeTombstone)> = None;
        for (idx, child) in self.children.iter().enumerate() {
            if !child.valid() {
                continue;
            }
            let tombstone = child.tombstone();
            let better = match &best {
                None => true,
                Some((_, current)) => {
                    self.order
                        .compare(&tombstone.start_key, &current.start_key)
                        .then_with(|| current.seq.cmp(&tombstone.seq))
                        == Ordering::Less
                }
            };
            if better {
                best = Some((idx, tombstone));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

impl Iterator for AggregatorIter<'_> {
    type Item = RangeTombstone;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.valid() {
            return None;
        }
        let tombstone = self.tombstone();
        self.advance();
        Some(tombstone)
    }
}
