//! Emission of collapsed tombstones into a compaction output file.
//!
//! Compaction writes each output SST through a table builder; the
//! aggregator appends the tombstones that belong to that file, clipped to
//! the file's key-space slice `[lower_bound, upper_bound)`, and keeps the
//! file's metadata (smallest/largest internal keys, sequence range)
//! consistent with what was written.

use tracing::debug;

use crate::key::{InternalKey, SequenceNumber, ValueKind, MAX_SEQUENCE_NUMBER};

use super::RangeDelAggregator;

// ------------------------------------------------------------------------------------------------
// Table builder sink
// ------------------------------------------------------------------------------------------------

/// Sink for emitted tombstone records.
///
/// Receives `(encoded_internal_key, end_user_key)` pairs in the order the
/// aggregator produces them: per stripe, ascending by start key.
pub trait TableBuilder {
    fn add(&mut self, internal_key: &[u8], value: &[u8]);
}

// ------------------------------------------------------------------------------------------------
// Output-file metadata
// ------------------------------------------------------------------------------------------------

/// Evolving metadata of the output file being built.
///
/// The sequence range starts at the extremes and narrows as records are
/// written; the boundary keys start unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Smallest internal key written so far.
    pub smallest: Option<InternalKey>,

    /// Largest internal key written so far.
    pub largest: Option<InternalKey>,

    /// Minimum sequence number written so far.
    pub smallest_seqno: SequenceNumber,

    /// Maximum sequence number written so far.
    pub largest_seqno: SequenceNumber,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            smallest: None,
            largest: None,
            smallest_seqno: MAX_SEQUENCE_NUMBER,
            largest_seqno: 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Emission
// ------------------------------------------------------------------------------------------------

impl RangeDelAggregator {
    /// Append this task's tombstones to `builder`, restricted to the
    /// output file's key-space slice, and update `meta` accordingly.
    ///
    /// - Tombstones starting at or after `upper_bound` belong to the next
    ///   output file; iteration stops there since starts only grow.
    /// - Tombstones ending at or before `lower_bound` belong to the
    ///   previous file and are skipped.
    /// - When `bottommost_level` is set the oldest stripe is dropped
    ///   entirely: nothing below the bottommost level could still be
    ///   shadowed, so those tombstones are obsolete.
    ///
    /// The file boundary keys recorded in `meta` are pinched to the slice
    /// bounds so output files appear key-space partitioned: a smallest
    /// key clamped to `lower_bound` takes sequence `0` (sorting after the
    /// previous file's largest), a largest key clamped to `upper_bound`
    /// takes [`MAX_SEQUENCE_NUMBER`] (sorting before the next file's
    /// smallest).
    pub fn add_to_builder(
        &self,
        builder: &mut dyn TableBuilder,
        lower_bound: Option<&[u8]>,
        upper_bound: Option<&[u8]>,
        meta: &mut FileMetadata,
        bottommost_level: bool,
    ) {
        let Some(stripes) = &self.stripes else {
            return;
        };

        let mut stripes = stripes.iter();
        if bottommost_level {
            if let Some((_, oldest)) = stripes.next() {
                debug!(
                    dropped = oldest.len(),
                    "bottommost level: dropping obsolete tombstones from oldest stripe"
                );
            }
        }

        for (_, stripe) in stripes {
            let mut first_added = false;
            let mut cursor = stripe.iter();
            while cursor.valid() {
                let tombstone = cursor.tombstone();
                if let Some(upper) = upper_bound {
                    if self.order.compare(upper, &tombstone.start_key) != std::cmp::Ordering::Greater
                    {
                        // This and all later tombstones start past the
                        // file; they go to the next output.
                        break;
                    }
                }
                if let Some(lower) = lower_bound {
                    if self.order.compare(&tombstone.end_key, lower) != std::cmp::Ordering::Greater
                    {
                        // Entirely before the file; belongs to the
                        // previous output. Later tombstones may still
                        // overlap the slice.
                        cursor.advance();
                        continue;
                    }
                }

                builder.add(&tombstone.serialize_key(), &tombstone.end_key);

                if !first_added {
                    first_added = true;
                    let mut smallest_candidate = InternalKey::new(
                        tombstone.start_key.clone(),
                        tombstone.seq,
                        ValueKind::RangeDeletion,
                    );
                    if let Some(lower) = lower_bound {
                        if self.order.compare(smallest_candidate.user_key(), lower)
                            != std::cmp::Ordering::Greater
                        {
                            smallest_candidate =
                                InternalKey::new(lower.to_vec(), 0, ValueKind::RangeDeletion);
                        }
                    }
                    let replace = match &meta.smallest {
                        None => true,
                        Some(current) => {
                            smallest_candidate.compare(current, self.order)
                                == std::cmp::Ordering::Less
                        }
                    };
                    if replace {
                        meta.smallest = Some(smallest_candidate);
                    }
                }

                let mut largest_candidate = tombstone.end_internal_key();
                if let Some(upper) = upper_bound {
                    if self.order.compare(upper, largest_candidate.user_key())
                        != std::cmp::Ordering::Greater
                    {
                        largest_candidate = InternalKey::new(
                            upper.to_vec(),
                            MAX_SEQUENCE_NUMBER,
                            ValueKind::RangeDeletion,
                        );
                    }
                }
                let replace = match &meta.largest {
                    None => true,
                    Some(current) => {
                        current.compare(&largest_candidate, self.order) == std::cmp::Ordering::Less
                    }
                };
                if replace {
                    meta.largest = Some(largest_candidate);
                }

                meta.smallest_seqno = meta.smallest_seqno.min(tombstone.seq);
                meta.largest_seqno = meta.largest_seqno.max(tombstone.seq);

                cursor.advance();
            }
        }
    }
}
