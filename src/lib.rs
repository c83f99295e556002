//! # rangedel
//!
//! Range-deletion aggregation for **Log-Structured Merge Tree (LSM)**
//! storage engines. A range deletion logically deletes every key in a
//! half-open interval `[start, end)` at a sequence number; because LSM
//! data is immutable once written, such deletions are persisted as
//! tombstone records and must be consulted on every read and every
//! compaction. This crate is the data structure that makes those
//! consultations cheap.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   RangeDelAggregator                       │
//! │                                                            │
//! │  sources ──► decode ──► truncate to file bounds            │
//! │                              │                             │
//! │              ┌───────────────┼───────────────┐             │
//! │              ▼               ▼               ▼             │
//! │  ┌────────────────┐ ┌────────────────┐ ┌────────────────┐  │
//! │  │ stripe (-∞,s₁] │ │ stripe (s₁,s₂] │ │ stripe (s₂,MAX]│  │
//! │  │ tombstone map  │ │ tombstone map  │ │ tombstone map  │  │
//! │  └───────┬────────┘ └───────┬────────┘ └───────┬────────┘  │
//! │          │                  │                  │           │
//! │          └── should_delete ─┴─ merging iter ───┘           │
//! │                  (reads)      add_to_builder (compaction)  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`key`] | User-key ordering, value kinds, internal-key wire codec |
//! | [`tombstone`] | Collapsed and uncollapsed tombstone maps and their iterators |
//! | [`aggregator`] | Snapshot-stripe fan-out, ingestion, queries, emission |
//!
//! ## Key Features
//!
//! - **Collapsed representation** — arbitrarily overlapping tombstones
//!   merge into a non-overlapping transition map with `O(log n)` point
//!   lookups, built incrementally in any insertion order.
//! - **Snapshot stripes** — tombstones partition by sequence band so
//!   MVCC reads at a snapshot never observe later deletions.
//! - **File-boundary truncation** — tombstones ingested from an SST are
//!   clipped to that file's authority, down to exact internal-key
//!   positions at shared boundary user keys.
//! - **Compaction emission** — per-output-file tombstone enumeration
//!   with key-space partitioned file metadata.
//!
//! ## Quick Start
//!
//! ```rust
//! use rangedel::aggregator::{RangeDelAggregator, VecSource};
//! use rangedel::key::{encode_internal_key, UserKeyOrder, ValueKind};
//! use rangedel::tombstone::{PositioningMode, RangeTombstone};
//!
//! let mut agg = RangeDelAggregator::new(UserKeyOrder::Bytewise, &[], true);
//!
//! // Ingest a tombstone deleting [b, d) at sequence 10.
//! let source = VecSource::from_tombstones(&[RangeTombstone::new(
//!     b"b".to_vec(),
//!     b"d".to_vec(),
//!     10,
//! )]);
//! agg.add_tombstones(source, None, None).unwrap();
//!
//! // A write of "c" at sequence 7 is shadowed; at sequence 12 it is not.
//! let shadowed = encode_internal_key(b"c", 7, ValueKind::Value);
//! let live = encode_internal_key(b"c", 12, ValueKind::Value);
//! assert!(agg.should_delete(&shadowed, PositioningMode::BinarySearch).unwrap());
//! assert!(!agg.should_delete(&live, PositioningMode::BinarySearch).unwrap());
//! ```

#![allow(dead_code)]

pub mod aggregator;
pub mod key;
pub mod tombstone;
