#[cfg(test)]
mod tests {
    use crate::aggregator::tests::helpers::*;
    use crate::aggregator::{RangeDelAggregator, RangeDelError, VecSource};
    use crate::key::{UserKeyOrder, ValueKind, MAX_SEQUENCE_NUMBER};
    use crate::tombstone::PositioningMode;

    #[test]
    fn test_empty() {
        verify_range_dels(&[], &[alive(b"a", 0)], &[]);
    }

    #[test]
    fn test_same_start_and_end() {
        // An empty tombstone is representable but covers nothing.
        verify_range_dels(
            &[batch(vec![ts(b"a", b"a", 5)])],
            &[alive(b" ", 0), alive(b"a", 0), alive(b"b", 0)],
            &[],
        );
    }

    #[test]
    fn test_single() {
        verify_range_dels(
            &[batch(vec![ts(b"a", b"b", 10)])],
            &[alive(b" ", 0), shadowed(b"a", 10), alive(b"b", 0)],
            &[ts(b"a", b"b", 10)],
        );
    }

    #[test]
    fn test_is_empty() {
        init_tracing();
        for collapse in [false, true] {
            let eager = RangeDelAggregator::new(UserKeyOrder::Bytewise, &[], collapse);
            assert!(eager.is_empty());

            let lazy = RangeDelAggregator::for_snapshot(
                UserKeyOrder::Bytewise,
                MAX_SEQUENCE_NUMBER,
                collapse,
            );
            assert!(lazy.is_empty());
        }
    }

    #[test]
    fn test_lazy_aggregator_materializes_on_first_record() {
        init_tracing();
        let mut agg = RangeDelAggregator::for_snapshot(UserKeyOrder::Bytewise, 100, true);

        // An empty source must not allocate stripes.
        add_tombstones(&mut agg, &[], None, None);
        assert!(agg.is_empty());

        add_tombstones(&mut agg, &[ts(b"a", b"c", 10)], None, None);
        assert!(!agg.is_empty());
        let key = ikey(b"b", 9, ValueKind::Value);
        assert!(agg
            .should_delete(&key, PositioningMode::BinarySearch)
            .unwrap());
    }

    #[test]
    fn test_should_add_tombstones_skips_oldest_stripe_when_bottommost() {
        init_tracing();
        let mut agg = RangeDelAggregator::new(UserKeyOrder::Bytewise, &[20], true);
        add_tombstones(&mut agg, &[ts(b"a", b"c", 5)], None, None);

        // The only tombstone sits in the oldest stripe: obsolete at the
        // bottommost level, still needed elsewhere.
        assert!(agg.should_add_tombstones(false));
        assert!(!agg.should_add_tombstones(true));

        add_tombstones(&mut agg, &[ts(b"d", b"e", 30)], None, None);
        assert!(agg.should_add_tombstones(true));
    }

    #[test]
    fn test_corrupt_record_aborts_ingestion() {
        init_tracing();
        let mut agg = RangeDelAggregator::new(UserKeyOrder::Bytewise, &[], true);
        let source = VecSource::new(vec![(b"short".to_vec(), b"z".to_vec())]);
        let err = agg.add_tombstones(source, None, None).unwrap_err();
        assert!(matches!(err, RangeDelError::Corruption(_)));
    }

    #[test]
    fn test_query_on_empty_aggregator() {
        init_tracing();
        let mut agg = RangeDelAggregator::for_snapshot(UserKeyOrder::Bytewise, 50, true);
        let key = ikey(b"a", 1, ValueKind::Value);
        assert!(!agg
            .should_delete(&key, PositioningMode::BinarySearch)
            .unwrap());
        assert!(agg.get_tombstone(&key, 1).unwrap().start_key().is_none());
        assert!(!agg.is_range_overlapped(b"a", b"z"));
    }
}
