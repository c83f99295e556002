use crate::aggregator::{RangeDelAggregator, VecSource};
use crate::key::{encode_internal_key, InternalKey, SequenceNumber, UserKeyOrder, ValueKind};
use crate::tombstone::{PositioningMode, RangeTombstone};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shorthand tombstone constructor.
pub fn ts(start: &[u8], end: &[u8], seq: SequenceNumber) -> RangeTombstone {
    RangeTombstone::new(start.to_vec(), end.to_vec(), seq)
}

/// Encoded internal key shorthand.
pub fn ikey(user_key: &[u8], seq: SequenceNumber, kind: ValueKind) -> Vec<u8> {
    encode_internal_key(user_key, seq, kind)
}

/// Encode and ingest a tombstone list, optionally clipped to file bounds.
pub fn add_tombstones(
    agg: &mut RangeDelAggregator,
    tombstones: &[RangeTombstone],
    smallest: Option<&InternalKey>,
    largest: Option<&InternalKey>,
) {
    agg.add_tombstones(VecSource::from_tombstones(tombstones), smallest, largest)
        .expect("ingest");
}

/// One `add_tombstones` call in a verification scenario.
pub struct Batch {
    pub tombstones: Vec<RangeTombstone>,
    pub smallest: Option<InternalKey>,
    pub largest: Option<InternalKey>,
}

pub fn batch(tombstones: Vec<RangeTombstone>) -> Batch {
    Batch {
        tombstones,
        smallest: None,
        largest: None,
    }
}

pub fn bounded_batch(tombstones: Vec<RangeTombstone>, smallest: InternalKey, largest: InternalKey) -> Batch {
    Batch {
        tombstones,
        smallest: Some(smallest),
        largest: Some(largest),
    }
}

/// A point probe. `should_delete` must be false at `(key, seq)` itself;
/// when `seq > 0`, the probe `(key, seq − 1)` must be shadowed unless
/// `alive` is set.
pub struct Probe {
    pub key: Vec<u8>,
    pub seq: SequenceNumber,
    pub alive: bool,
}

/// Probe expecting `(key, seq − 1)` to be shadowed.
pub fn shadowed(key: &[u8], seq: SequenceNumber) -> Probe {
    Probe {
        key: key.to_vec(),
        seq,
        alive: false,
    }
}

/// Probe expecting `(key, seq − 1)` to stay visible.
pub fn alive(key: &[u8], seq: SequenceNumber) -> Probe {
    Probe {
        key: key.to_vec(),
        seq,
        alive: true,
    }
}

/// Drain a cursor-style iterator and compare against expected tombstones.
pub fn verify_iter(
    iter: impl Iterator<Item = RangeTombstone>,
    expected: &[RangeTombstone],
) {
    let got: Vec<RangeTombstone> = iter.collect();
    assert_eq!(got, expected, "iterator contents mismatch");
}

pub fn verify_range_dels(batches: &[Batch], probes: &[Probe], expected_collapsed: &[RangeTombstone]) {
    verify_range_dels_with_order(batches, probes, expected_collapsed, UserKeyOrder::Bytewise);
}

/// Exhaustive scenario check, ported across both map variants.
///
/// Runs the batches through collapsed and uncollapsed aggregators, in
/// given and reversed per-batch order, and checks:
///
/// - every probe (see [`Probe`]) under the variant's natural positioning
///   mode; probes must therefore be listed in ascending key order;
/// - the collapsed iterator yields exactly `expected_collapsed`;
/// - the uncollapsed iterator preserves start-key order with arrival
///   order among ties (single unbounded batch only, since truncation
///   changes the stored tombstones);
/// - `is_range_overlapped` between consecutive probe keys on an
///   uncollapsed aggregator: expected iff either end's probe sequence is
///   nonzero.
pub fn verify_range_dels_with_order(
    batches: &[Batch],
    probes: &[Probe],
    expected_collapsed: &[RangeTombstone],
    order: UserKeyOrder,
) {
    init_tracing();
    for collapsed in [false, true] {
        for reverse in [false, true] {
            let mut agg = RangeDelAggregator::new(order, &[], collapsed);
            let mut all: Vec<RangeTombstone> = Vec::new();
            for b in batches {
                let mut tombstones = b.tombstones.clone();
                if reverse {
                    tombstones.reverse();
                }
                all.extend(tombstones.iter().cloned());
                add_tombstones(&mut agg, &tombstones, b.smallest.as_ref(), b.largest.as_ref());
            }

            let mode = if collapsed {
                PositioningMode::ForwardTraversal
            } else {
                PositioningMode::FullScan
            };
            for probe in probes {
                let key = ikey(&probe.key, probe.seq, ValueKind::Value);
                assert!(
                    !agg.should_delete(&key, mode).expect("query"),
                    "({:?}, {}) must never be shadowed at its own sequence",
                    String::from_utf8_lossy(&probe.key),
                    probe.seq,
                );
                if probe.seq > 0 {
                    let key = ikey(&probe.key, probe.seq - 1, ValueKind::Value);
                    assert_eq!(
                        agg.should_delete(&key, mode).expect("query"),
                        !probe.alive,
                        "unexpected coverage at ({:?}, {}) [collapsed={}, reverse={}]",
                        String::from_utf8_lossy(&probe.key),
                        probe.seq - 1,
                        collapsed,
                        reverse,
                    );
                }
            }

            if collapsed {
                verify_iter(agg.iter(), expected_collapsed);
            } else if batches.len() == 1
                && batches[0].smallest.is_none()
                && batches[0].largest.is_none()
            {
                // sort_by is stable: ties keep arrival order, matching
                // the multiset's guarantee.
                let mut expected = all;
                expected.sort_by(|a, b| order.compare(&a.start_key, &b.start_key));
                verify_iter(agg.iter(), &expected);
            }
        }
    }

    // Overlap probes run on an uncollapsed aggregator only.
    let mut agg = RangeDelAggregator::new(order, &[], false);
    for b in batches {
        add_tombstones(&mut agg, &b.tombstones, b.smallest.as_ref(), b.largest.as_ref());
    }
    for pair in probes.windows(2) {
        let overlapped = agg.is_range_overlapped(&pair[0].key, &pair[1].key);
        assert_eq!(
            overlapped,
            pair[0].seq > 0 || pair[1].seq > 0,
            "overlap mismatch for [{:?}, {:?}]",
            String::from_utf8_lossy(&pair[0].key),
            String::from_utf8_lossy(&pair[1].key),
        );
    }
}
