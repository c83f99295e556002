//! # Aggregator Module
//!
//! Fans raw tombstone records into per-snapshot **stripes** and answers
//! read-path and compaction-path queries against them.
//!
//! ## Stripe model
//!
//! Given snapshots `s_1 < s_2 < … < s_m`, the aggregator keeps one
//! tombstone map per sequence band:
//!
//! ```text
//! (−∞, s_1]  (s_1, s_2]  …  (s_{m−1}, s_m]  (s_m, MAX_SEQUENCE_NUMBER]
//! ```
//!
//! A tombstone lives in exactly the stripe containing its sequence; a
//! record is checked only against the stripe containing *its* sequence.
//! This is what keeps tombstone visibility correct under MVCC snapshots:
//! a record preserved for some snapshot can only be shadowed by
//! tombstones visible at that same snapshot, never by later ones. A
//! tombstone at *exactly* a snapshot's sequence stays inside that
//! snapshot's band: each stripe includes its own upper boundary and
//! excludes the boundary below.
//!
//! ## Design Invariants
//!
//! - The stripe map, once initialised, always contains a terminal stripe
//!   at [`MAX_SEQUENCE_NUMBER`].
//! - One aggregator serves one logical read or compaction task; there is
//!   no internal locking and ingestion never overlaps queries.
//! - Every stored position in every stripe is invalidated at the start of
//!   each ingestion call, so positional hints never outlive mutations.
//! - Record bytes are copied on ingest; sources are released when
//!   ingestion returns.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Submodules
// ------------------------------------------------------------------------------------------------

mod emit;
mod iter;
mod source;

pub use emit::{FileMetadata, TableBuilder};
pub use iter::AggregatorIter;
pub use source::{TombstoneSource, VecSource};

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

use crate::key::{
    HexKey, InternalKey, ParseError, ParsedInternalKey, SequenceNumber, UserKeyOrder, ValueKind,
    MAX_SEQUENCE_NUMBER,
};
use crate::tombstone::{
    KeyBound, PartialTombstone, PositioningMode, TombstoneMap, TruncatedTombstone,
};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors surfaced by aggregator operations.
#[derive(Debug, Error)]
pub enum RangeDelError {
    /// A source record's internal key failed to decode; ingestion is
    /// aborted at the offending record.
    #[error("corrupt range tombstone record: {0}")]
    Corruption(#[from] ParseError),
}

// ------------------------------------------------------------------------------------------------
// Aggregator
// ------------------------------------------------------------------------------------------------

/// Collects the range tombstones relevant to one read or compaction task
/// and answers coverage and emission queries over them.
///
/// Built in one of two ways:
///
/// - [`RangeDelAggregator::new`] — eager, with the full snapshot list;
///   used by compaction, which sees tombstones across all stripes.
/// - [`RangeDelAggregator::for_snapshot`] — lazy, bounded by a single
///   read snapshot; stripes materialise on the first ingested record.
///
/// Collapsed maps answer point queries in `O(log n)` but give up
/// range-overlap probes; uncollapsed maps are the reverse. See the
/// capability table in [`crate::tombstone`].
#[derive(Debug)]
pub struct RangeDelAggregator {
    /// Sequence ceiling: [`MAX_SEQUENCE_NUMBER`] for compaction, the read
    /// snapshot for reads.
    upper_bound: SequenceNumber,

    order: UserKeyOrder,
    collapse: bool,

    /// Stripe maps keyed by their upper sequence bound. `None` until the
    /// first record arrives on a lazily-built aggregator.
    stripes: Option<BTreeMap<SequenceNumber, TombstoneMap>>,
}

impl RangeDelAggregator {
    /// Eager aggregator over the given snapshot list.
    pub fn new(order: UserKeyOrder, snapshots: &[SequenceNumber], collapse: bool) -> Self {
        let mut aggregator = Self {
            upper_bound: MAX_SEQUENCE_NUMBER,
            order,
            collapse,
            stripes: None,
        };
        aggregator.init_stripes(snapshots);
        aggregator
    }

    /// Lazy aggregator for a read at `snapshot`. No stripe storage is
    /// allocated until a tombstone actually arrives.
    pub fn for_snapshot(order: UserKeyOrder, snapshot: SequenceNumber, collapse: bool) -> Self {
        Self {
            upper_bound: snapshot,
            order,
            collapse,
            stripes: None,
        }
    }

    fn init_stripes(&mut self, snapshots: &[SequenceNumber]) {
        debug_assert!(self.stripes.is_none());
        let mut stripes = BTreeMap::new();
        for &snapshot in snapshots {
            stripes.insert(snapshot, TombstoneMap::new(self.order, self.collapse));
        }
        // Data newer than any snapshot falls into the terminal stripe.
        stripes.insert(
            MAX_SEQUENCE_NUMBER,
            TombstoneMap::new(self.order, self.collapse),
        );
        self.stripes = Some(stripes);
    }

    /// The stripe whose sequence band contains `sequence`.
    ///
    /// A stripe includes its own upper snapshot sequence and excludes the
    /// snapshot below, so this is the first stripe keyed at or above
    /// `sequence`; the terminal stripe guarantees one exists.
    fn stripe_for_mut(&mut self, sequence: SequenceNumber) -> &mut TombstoneMap {
        self.stripes
            .as_mut()
            .expect("stripes initialised before stripe selection")
            .range_mut(sequence..)
            .next()
            .expect("terminal stripe at MAX_SEQUENCE_NUMBER always exists")
            .1
    }

    fn stripe_for(&self, sequence: SequenceNumber) -> Option<&TombstoneMap> {
        Some(
            self.stripes
                .as_ref()?
                .range(sequence..)
                .next()
                .expect("terminal stripe at MAX_SEQUENCE_NUMBER always exists")
                .1,
        )
    }

    // --------------------------------------------------------------------------------------------
    // Ingestion
    // --------------------------------------------------------------------------------------------

    /// Drain `source` into the stripe maps, clipping each tombstone to the
    /// originating file's boundary keys when supplied.
    ///
    /// # Truncation
    /// A tombstone extending past `smallest` / `largest` is cut back to
    /// the boundary's user key. When the boundary is a point key (kind
    /// other than [`ValueKind::RangeDeletion`]), the cut lands at the
    /// boundary's exact `(user_key, sequence)` position: internal keys of
    /// the same user key on the far side of the boundary are outside the
    /// file and must not be shadowed by it.
    ///
    /// # Errors
    /// [`RangeDelError::Corruption`] when a record key fails to parse;
    /// records before the failure remain ingested.
    pub fn add_tombstones<S: TombstoneSource>(
        &mut self,
        mut source: S,
        smallest: Option<&InternalKey>,
        largest: Option<&InternalKey>,
    ) -> Result<(), RangeDelError> {
        source.seek_to_first();
        let mut first_record = true;
        while source.valid() {
            if first_record {
                if self.stripes.is_none() {
                    let upper_bound = self.upper_bound;
                    self.init_stripes(&[upper_bound]);
                } else {
                    self.invalidate_positions();
                }
                first_record = false;
            }

            let tombstone = {
                let parsed = ParsedInternalKey::parse(source.key())?;

                let mut start = KeyBound::max(parsed.user_key.to_vec());
                if let Some(smallest) = smallest {
                    if self.order.compare(&start.user_key, smallest.user_key())
                        == std::cmp::Ordering::Less
                    {
                        start = boundary_bound(smallest);
                    }
                }

                let mut end = KeyBound::max(source.value().to_vec());
                if let Some(largest) = largest {
                    if self.order.compare(largest.user_key(), &end.user_key)
                        == std::cmp::Ordering::Less
                    {
                        end = boundary_bound(largest);
                    }
                }

                trace!(
                    seq = parsed.sequence,
                    start = %HexKey(&start.user_key),
                    end = %HexKey(&end.user_key),
                    "ingesting range tombstone"
                );

                TruncatedTombstone {
                    start,
                    end,
                    seq: parsed.sequence,
                }
            };

            self.stripe_for_mut(tombstone.seq).add_tombstone(tombstone);
            source.next();
        }
        Ok(())
    }

    /// Drop every stripe's stored query position.
    pub fn invalidate_positions(&mut self) {
        if let Some(stripes) = &mut self.stripes {
            for stripe in stripes.values_mut() {
                stripe.invalidate_position();
            }
        }
    }

    // --------------------------------------------------------------------------------------------
    // Queries
    // --------------------------------------------------------------------------------------------

    /// Whether the encoded internal key is shadowed by an ingested
    /// tombstone visible at its sequence.
    pub fn should_delete(
        &mut self,
        internal_key: &[u8],
        mode: PositioningMode,
    ) -> Result<bool, RangeDelError> {
        let parsed = ParsedInternalKey::parse(internal_key)?;
        Ok(self.should_delete_parsed(&parsed, mode))
    }

    /// [`Self::should_delete`] for an already-parsed key.
    pub fn should_delete_parsed(
        &mut self,
        key: &ParsedInternalKey<'_>,
        mode: PositioningMode,
    ) -> bool {
        if self.stripes.is_none() {
            return false;
        }
        let stripe = self.stripe_for_mut(key.sequence);
        if stripe.is_empty() {
            return false;
        }
        stripe.should_delete(key, mode)
    }

    /// Whether every key of `[begin, end]` (encoded internal keys,
    /// inclusive user-key range) is shadowed for a reader at `sequence`.
    ///
    /// # Panics
    /// On an uncollapsed aggregator; only the collapsed representation
    /// can answer this without a full scan.
    pub fn should_delete_range(
        &self,
        begin: &[u8],
        end: &[u8],
        sequence: SequenceNumber,
    ) -> Result<bool, RangeDelError> {
        let begin = ParsedInternalKey::parse(begin)?;
        let end = ParsedInternalKey::parse(end)?;
        match self.stripe_for(sequence) {
            Some(TombstoneMap::Collapsed(map)) => {
                Ok(map.should_delete_range(begin.user_key, end.user_key, sequence))
            }
            Some(TombstoneMap::Uncollapsed(_)) => {
                panic!("should_delete_range requires a collapsed aggregator")
            }
            None => Ok(false),
        }
    }

    /// The tombstone interval containing `internal_key`, for callers that
    /// cache the covering range for locality. The returned value owns its
    /// keys and stays valid across later ingestion.
    ///
    /// # Panics
    /// On an uncollapsed aggregator.
    pub fn get_tombstone(
        &self,
        internal_key: &[u8],
        query_seq: SequenceNumber,
    ) -> Result<PartialTombstone, RangeDelError> {
        let parsed = ParsedInternalKey::parse(internal_key)?;
        match self.stripe_for(parsed.sequence) {
            Some(TombstoneMap::Collapsed(map)) => {
                Ok(map.get_tombstone(parsed.user_key, parsed.sequence, query_seq))
            }
            Some(TombstoneMap::Uncollapsed(_)) => {
                panic!("get_tombstone requires a collapsed aggregator")
            }
            None => Ok(PartialTombstone::default()),
        }
    }

    /// Whether any stripe holds a non-empty tombstone overlapping the
    /// inclusive user-key range `[start, end]`.
    ///
    /// # Panics
    /// On a collapsed aggregator; the one caller, file ingestion, builds
    /// uncollapsed aggregators.
    pub fn is_range_overlapped(&self, start: &[u8], end: &[u8]) -> bool {
        match &self.stripes {
            None => false,
            Some(stripes) => stripes
                .values()
                .any(|stripe| stripe.is_range_overlapped(start, end)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.stripes {
            None => true,
            Some(stripes) => stripes.values().all(TombstoneMap::is_empty),
        }
    }

    /// Whether emission would write anything. Tombstones in the oldest
    /// stripe are obsolete at the bottommost level: everything below
    /// them has already been compacted away.
    pub fn should_add_tombstones(&self, bottommost_level: bool) -> bool {
        let Some(stripes) = &self.stripes else {
            return false;
        };
        stripes
            .values()
            .skip(usize::from(bottommost_level))
            .any(|stripe| !stripe.is_empty())
    }

    /// Merging cursor over all stripes in start-key order.
    pub fn iter(&self) -> AggregatorIter<'_> {
        let children = match &self.stripes {
            None => Vec::new(),
            Some(stripes) => stripes.values().map(TombstoneMap::iter).collect(),
        };
        AggregatorIter::new(self.order, children)
    }
}

/// The bound at which a file boundary key cuts a tombstone: the boundary
/// user key, refined to the boundary's exact sequence when it is a point
/// key rather than a range-deletion sentinel.
fn boundary_bound(boundary: &InternalKey) -> KeyBound {
    match boundary.kind() {
        ValueKind::RangeDeletion => KeyBound::max(boundary.user_key().to_vec()),
        _ => KeyBound::at(boundary.user_key().to_vec(), boundary.sequence()),
    }
}
