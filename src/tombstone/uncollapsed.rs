//! Uncollapsed tombstone map — an ordered multiset scanned on query.
//!
//! Quick to build, slow to answer `should_delete`. Used where every
//! tombstone is visited once anyway (file ingestion) and where insertion
//! order among equal start keys must be observable.

use std::cmp::Ordering;

use crate::key::{ParsedInternalKey, UserKeyOrder, MAX_SEQUENCE_NUMBER};

use super::{PositioningMode, RangeTombstone, TruncatedTombstone};

/// Multiset of tombstones ordered by start bound; duplicates and
/// degenerate intervals are preserved as given.
#[derive(Debug)]
pub struct UncollapsedMap {
    order: UserKeyOrder,
    rep: Vec<TruncatedTombstone>,
}

impl UncollapsedMap {
    pub fn new(order: UserKeyOrder) -> Self {
        Self {
            order,
            rep: Vec::new(),
        }
    }

    /// Insert in start-bound order; equal start bounds keep arrival order.
    pub fn add_tombstone(&mut self, tombstone: TruncatedTombstone) {
        let at = self.rep.partition_point(|t| {
            t.start.compare(&tombstone.start, self.order) != Ordering::Greater
        });
        self.rep.insert(at, tombstone);
    }

    /// Point-coverage query via linear scan in start order.
    ///
    /// Scans until the first tombstone starting after the key; the key is
    /// shadowed iff some earlier tombstone has a larger sequence and an
    /// end bound past the key.
    pub fn should_delete(&self, key: &ParsedInternalKey<'_>, mode: PositioningMode) -> bool {
        debug_assert_eq!(mode, PositioningMode::FullScan);
        for tombstone in &self.rep {
            if tombstone
                .start
                .compare_key(key.user_key, key.sequence, self.order)
                == Ordering::Greater
            {
                break;
            }
            if key.sequence < tombstone.seq
                && tombstone
                    .end
                    .compare_key(key.user_key, key.sequence, self.order)
                    == Ordering::Greater
            {
                return true;
            }
        }
        false
    }

    /// True iff some non-empty tombstone intersects the inclusive
    /// user-key range `[start, end]`.
    pub fn is_range_overlapped(&self, start: &[u8], end: &[u8]) -> bool {
        self.rep.iter().any(|t| {
            t.start.compare(&t.end, self.order) == Ordering::Less
                && t.start.compare_key(end, 0, self.order) != Ordering::Greater
                && t.end.compare_key(start, MAX_SEQUENCE_NUMBER, self.order) == Ordering::Greater
        })
    }

    pub fn len(&self) -> usize {
        self.rep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rep.is_empty()
    }

    pub fn iter(&self) -> UncollapsedIter<'_> {
        UncollapsedIter {
            rep: &self.rep,
            idx: 0,
        }
    }
}

/// Forward-only cursor over the multiset in start order.
#[derive(Debug)]
pub struct UncollapsedIter<'a> {
    rep: &'a [TruncatedTombstone],
    idx: usize,
}

impl<'a> UncollapsedIter<'a> {
    pub fn valid(&self) -> bool {
        self.idx < self.rep.len()
    }

    /// The tombstone under the cursor. The cursor must be valid.
    pub fn tombstone(&self) -> RangeTombstone {
        self.rep[self.idx].to_tombstone()
    }

    pub fn advance(&mut self) {
        self.idx += 1;
    }
}

impl Iterator for UncollapsedIter<'_> {
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
