//! Collapsed tombstone map — transition points with positioned lookups.
//!
//! Slow to build, fast to query. The representation rests on one
//! observation: wherever tombstones overlap, only the one with the
//! largest sequence matters. Suppose the map holds `[b, n) @ 1`,
//! `[e, h) @ 2`, `[q, t) @ 2` and `[g, k) @ 3`:
//!
//! ```text
//!     3:        g---k
//!     2:     e---h        q--t
//!     1:  b------------n
//! ```
//!
//! For any reader above sequence 3 this is equivalent to a set of
//! non-overlapping intervals, which can be stored as an ordered list of
//! **transitions** from one governing tombstone to the next:
//!
//! ```text
//!     b → 1, e → 2, g → 3, k → 1, n → 0, q → 2, t → 0
//! ```
//!
//! A transition `key → seq` reads: "from `key` (inclusive) until the next
//! transition, the live tombstone has sequence `seq`". Where a tombstone
//! ends before the next begins, a sentinel `→ 0` records the gap (`n` and
//! `t` above); the final entry is always such a sentinel. A point query
//! binary-searches for the last transition at or before its key and is
//! covered iff that transition's sequence is larger than its own.
//!
//! Transitions are keyed by [`KeyBound`] rather than bare user keys so
//! that file-boundary truncation can clip a tombstone mid-way through one
//! user key's version space.

use std::cmp::Ordering;

use crate::key::{
    InternalKey, ParsedInternalKey, SequenceNumber, UserKeyOrder, ValueKind, MAX_SEQUENCE_NUMBER,
};

use super::{KeyBound, PartialTombstone, PositioningMode, RangeTombstone, TruncatedTombstone};

// ------------------------------------------------------------------------------------------------
// Transition entries
// ------------------------------------------------------------------------------------------------

/// One entry of the collapsed representation.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    /// Position where this tombstone takes over.
    pub key: KeyBound,

    /// Sequence of the governing tombstone; `0` marks a gap.
    pub seq: SequenceNumber,
}

// ------------------------------------------------------------------------------------------------
// Collapsed map
// ------------------------------------------------------------------------------------------------

/// Ordered map of transition points with an explicit query cursor.
///
/// # Invariants
/// - Transition keys are strictly increasing under the user-key order.
/// - No two adjacent transitions carry the same sequence.
/// - The last transition (if any) is a `→ 0` sentinel.
///
/// The cursor ([`PositioningMode::ForwardTraversal`] /
/// [`PositioningMode::BackwardTraversal`]) is invalidated by every
/// mutation and self-heals by falling back to binary search.
#[derive(Debug)]
pub struct CollapsedMap {
    order: UserKeyOrder,
    rep: Vec<Transition>,

    /// Index of the transition governing the previous query, if still
    /// trustworthy.
    pos: Option<usize>,
}

impl CollapsedMap {
    pub fn new(order: UserKeyOrder) -> Self {
        Self {
            order,
            rep: Vec::new(),
            pos: None,
        }
    }

    /// First index whose transition key sorts strictly after `(user_key,
    /// sequence)`.
    fn upper_bound(&self, user_key: &[u8], sequence: SequenceNumber) -> usize {
        self.rep.partition_point(|t| {
            t.key.compare_key(user_key, sequence, self.order) != Ordering::Greater
        })
    }

    /// First index whose transition key sorts strictly after `bound`.
    fn upper_bound_of(&self, bound: &KeyBound) -> usize {
        self.rep
            .partition_point(|t| t.key.compare(bound, self.order) != Ordering::Greater)
    }

    /// Point-coverage query.
    ///
    /// # Panics
    /// On [`PositioningMode::FullScan`], which only the uncollapsed map
    /// supports.
    pub fn should_delete(&mut self, key: &ParsedInternalKey<'_>, mode: PositioningMode) -> bool {
        if self.rep.is_empty() {
            return false;
        }
        let mut mode = mode;
        if self.pos.is_none()
            && matches!(
                mode,
                PositioningMode::ForwardTraversal | PositioningMode::BackwardTraversal
            )
        {
            // Position was invalidated (e.g. by ingestion); reseek.
            mode = PositioningMode::BinarySearch;
        }
        match mode {
            PositioningMode::FullScan => {
                panic!("full-scan positioning is not supported on a collapsed map")
            }
            PositioningMode::BinarySearch => {
                let ub = self.upper_bound(key.user_key, key.sequence);
                if ub == 0 {
                    // Before the start of the deletion intervals.
                    self.pos = Some(0);
                    return false;
                }
                self.pos = Some(ub - 1);
            }
            PositioningMode::ForwardTraversal => {
                let mut i = self.pos.expect("checked above");
                if i == 0 && self.entry_after_key(0, key) {
                    return false;
                }
                while i + 1 < self.rep.len() && !self.entry_after_key(i + 1, key) {
                    i += 1;
                }
                self.pos = Some(i);
            }
            PositioningMode::BackwardTraversal => {
                let mut i = self.pos.expect("checked above");
                while i > 0 && self.entry_after_key(i, key) {
                    i -= 1;
                }
                if i == 0 && self.entry_after_key(0, key) {
                    self.pos = Some(0);
                    return false;
                }
                self.pos = Some(i);
            }
        }
        let active = &self.rep[self.pos.expect("positioned above")];
        debug_assert!(
            active
                .key
                .compare_key(key.user_key, key.sequence, self.order)
                != Ordering::Greater
        );
        key.sequence < active.seq
    }

    fn entry_after_key(&self, index: usize, key: &ParsedInternalKey<'_>) -> bool {
        self.rep[index]
            .key
            .compare_key(key.user_key, key.sequence, self.order)
            == Ordering::Greater
    }

    /// Merge one tombstone into the transition list.
    ///
    /// Works in three steps:
    ///
    /// 1. **Start point.** If the new tombstone's sequence dominates the
    ///    transition governing its start bound, install (or raise) a
    ///    transition there, remembering the displaced sequence as the one
    ///    to restore when the tombstone ends.
    /// 2. **Interior sweep.** Walk the transitions inside `[start, end)`.
    ///    Each one the new tombstone dominates is either erased (redundant
    ///    once the preceding transition already carries the new sequence)
    ///    or raised to the new sequence; each one that dominates the new
    ///    tombstone is left alone.
    /// 3. **End point.** If the transition just before the end bound now
    ///    carries the new sequence, the tombstone is unterminated:
    ///    install a transition restoring the last displaced sequence,
    ///    unless a transition already sits exactly at the end bound.
    ///    An existing end transition takes precedence under half-open
    ///    semantics.
    ///
    /// Tombstones with sequence `0` or an empty bound interval cover
    /// nothing and are dropped here, which is also what keeps sequence
    /// `0` reserved for gap sentinels.
    pub fn add_tombstone(&mut self, tombstone: TruncatedTombstone) {
        self.pos = None;
        if tombstone.seq == 0 || tombstone.is_degenerate(self.order) {
            return;
        }
        let TruncatedTombstone { start, end, seq } = tombstone;

        let mut it = self.upper_bound_of(&start);
        let prev_seq = if it == 0 { 0 } else { self.rep[it - 1].seq };

        // The sequence displaced most recently by the new tombstone; the
        // end-point transition restores it.
        let mut end_seq = 0;

        if seq > prev_seq {
            end_seq = prev_seq;
            if it > 0 && self.rep[it - 1].key == start {
                // Raise the existing transition at the start bound.
                self.rep[it - 1].seq = seq;
            } else {
                self.rep.insert(
                    it,
                    Transition {
                        key: start,
                        seq,
                    },
                );
                it += 1;
            }
        }

        while it < self.rep.len() && self.rep[it].key.compare(&end, self.order) == Ordering::Less {
            if seq > self.rep[it].seq {
                end_seq = self.rep[it].seq;
                let prev = if it == 0 { 0 } else { self.rep[it - 1].seq };
                if prev == seq {
                    // Superseded: the run already carries the new sequence.
                    self.rep.remove(it);
                } else {
                    // End of a run of dominating tombstones; keep the
                    // transition point but raise it.
                    self.rep[it].seq = seq;
                    it += 1;
                }
            } else {
                it += 1;
            }
        }

        let prev = if it == 0 { 0 } else { self.rep[it - 1].seq };
        if prev == seq {
            let exists_at_end = it < self.rep.len() && self.rep[it].key == end;
            if !exists_at_end {
                self.rep.insert(
                    it,
                    Transition {
                        key: end,
                        seq: end_seq,
                    },
                );
            }
        }
    }

    /// The interval containing `(user_key, sequence)`, with its sequence
    /// zeroed when it does not shadow a read at `query_seq`.
    ///
    /// Pure binary search; does not disturb the traversal cursor.
    pub fn get_tombstone(
        &self,
        user_key: &[u8],
        sequence: SequenceNumber,
        query_seq: SequenceNumber,
    ) -> PartialTombstone {
        if self.rep.is_empty() {
            return PartialTombstone::default();
        }
        let ub = self.upper_bound(user_key, sequence);
        if ub == 0 {
            return PartialTombstone::new(None, Some(self.lifted_key(0)), 0);
        }
        let active = &self.rep[ub - 1];
        let seq = if query_seq < active.seq { active.seq } else { 0 };
        let end_key = if ub < self.rep.len() {
            Some(self.lifted_key(ub))
        } else {
            None
        };
        PartialTombstone::new(Some(self.lifted_key(ub - 1)), end_key, seq)
    }

    fn lifted_key(&self, index: usize) -> InternalKey {
        InternalKey::new(
            self.rep[index].key.user_key.clone(),
            MAX_SEQUENCE_NUMBER,
            ValueKind::Max,
        )
    }

    /// True iff every point of the inclusive user-key range `[start, end]`
    /// is shadowed for a reader at `sequence`.
    pub fn should_delete_range(
        &self,
        start: &[u8],
        end: &[u8],
        sequence: SequenceNumber,
    ) -> bool {
        if self.order.compare(start, end) == Ordering::Greater || self.rep.is_empty() {
            return false;
        }
        let ub = self.upper_bound(start, sequence);
        if ub == 0 || self.rep[ub - 1].seq <= sequence {
            return false;
        }
        for transition in &self.rep[ub..] {
            if self.order.compare(&transition.key.user_key, end) == Ordering::Greater {
                break;
            }
            if transition.seq <= sequence {
                return false;
            }
        }
        true
    }

    /// Count of transitions minus the terminal sentinel.
    pub fn len(&self) -> usize {
        self.rep.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.rep.len() <= 1
    }

    /// Discard the traversal cursor; the next positioned query reseeks.
    pub fn invalidate_position(&mut self) {
        self.pos = None;
    }

    pub fn iter(&self) -> CollapsedIter<'_> {
        CollapsedIter {
            rep: &self.rep,
            order: self.order,
            idx: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn transitions(&self) -> &[Transition] {
        &self.rep
    }
}

// ------------------------------------------------------------------------------------------------
// Iterator
// ------------------------------------------------------------------------------------------------

/// Cursor over the non-empty intervals of a collapsed map.
///
/// Valid while not on the terminal sentinel; `advance` skips interior
/// gap sentinels.
#[derive(Debug)]
pub struct CollapsedIter<'a> {
    rep: &'a [Transition],
    order: UserKeyOrder,
    idx: usize,
}

impl<'a> CollapsedIter<'a> {
    pub fn valid(&self) -> bool {
        self.idx + 1 < self.rep.len()
    }

    /// The interval under the cursor. The cursor must be valid.
    pub fn tombstone(&self) -> RangeTombstone {
        RangeTombstone {
            start_key: self.rep[self.idx].key.user_key.clone(),
            end_key: self.rep[self.idx + 1].key.user_key.clone(),
            seq: self.rep[self.idx].seq,
        }
    }

    pub fn advance(&mut self) {
        self.idx += 1;
        self.skip_sentinels();
    }

    /// Position at the interval containing `target`, or the first
    /// interval after it.
    pub fn seek(&mut self, target: &[u8]) {
        self.idx = self.rep.partition_point(|t| {
            t.key.compare_key(target, MAX_SEQUENCE_NUMBER, self.order) != Ordering::Greater
        });
        if self.idx > 0 {
            self.idx -= 1;
        }
        self.skip_sentinels();
    }

    fn skip_sentinels(&mut self) {
        while self.valid() && self.rep[self.idx].seq == 0 {
            self.idx += 1;
        }
    }
}

impl Iterator for CollapsedIter<'_> {
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
