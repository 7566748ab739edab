//! Property-based tests for vsnd-core range algebra.
//!
//! Checks intersection soundness, commutativity and default selection over
//! randomly generated intervals, discrete sets and masks using proptest.

use proptest::prelude::*;
use vsnd_core::{ParamRangeSet, PcmParam, RangeSet, StreamDefaults, StreamParams};

/// Values are kept small so membership can be checked exhaustively.
const PROBE_LIMIT: u32 = 160;

fn numeric_range() -> impl Strategy<Value = RangeSet> {
    prop_oneof![
        (0u32..128, 0u32..128, 1u32..8)
            .prop_map(|(a, b, step)| RangeSet::stepped(a.min(b), a.max(b), step)),
        prop::collection::btree_set(0u32..128, 0..8).prop_map(RangeSet::discrete),
        Just(RangeSet::Empty),
    ]
}

fn any_range() -> impl Strategy<Value = RangeSet> {
    prop_oneof![
        3 => numeric_range(),
        1 => any::<u64>().prop_map(RangeSet::mask),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every value in `R ∩ H` is accepted by both R and H.
    #[test]
    fn intersection_is_subset_of_both(r in any_range(), h in any_range()) {
        let both = r.intersect(&h);
        for v in 0..PROBE_LIMIT {
            if both.contains(v) {
                prop_assert!(r.contains(v), "{} in {} but not in R={}", v, both, r);
                prop_assert!(h.contains(v), "{} in {} but not in H={}", v, both, h);
            }
        }
    }

    /// Every value accepted by both operands survives the intersection.
    #[test]
    fn intersection_keeps_common_values(r in any_range(), h in any_range()) {
        let both = r.intersect(&h);
        for v in 0..PROBE_LIMIT {
            if r.contains(v) && h.contains(v) {
                prop_assert!(both.contains(v), "{} lost from {} ∩ {} = {}", v, r, h, both);
            }
        }
    }

    /// `R ∩ H == H ∩ R`, structurally.
    #[test]
    fn intersection_commutes(r in any_range(), h in any_range()) {
        prop_assert_eq!(r.intersect(&h), h.intersect(&r));
    }

    /// `is_empty` agrees with membership.
    #[test]
    fn empty_means_no_members(r in any_range(), h in any_range()) {
        let both = r.intersect(&h);
        let any_member = (0..PROBE_LIMIT).any(|v| both.contains(v));
        prop_assert_eq!(both.is_empty(), !any_member);
    }

    /// The picked default is always a member; empty sets pick nothing.
    #[test]
    fn pick_default_is_member(r in any_range(), default in 0u32..200) {
        match r.pick_default(default) {
            Some(v) => prop_assert!(r.contains(v), "picked {} outside {}", v, r),
            None => prop_assert!(r.is_empty()),
        }
    }

    /// Picking the same default twice gives the same value.
    #[test]
    fn pick_default_is_deterministic(r in any_range(), default in 0u32..200) {
        prop_assert_eq!(r.pick_default(default), r.clone().pick_default(default));
    }

    /// A default already inside an interval is picked unchanged.
    #[test]
    fn interval_default_inside_is_kept(a in 0u32..1000, b in 0u32..1000, pick in 0u32..1000) {
        let range = RangeSet::interval(a.min(b), a.max(b));
        if range.contains(pick) {
            prop_assert_eq!(range.pick_default(pick), Some(pick));
        }
    }

    /// Concrete params chosen from non-empty ranges lie within them.
    #[test]
    fn stream_params_respect_ranges(
        rate in numeric_range(),
        channels in numeric_range(),
        buffer in numeric_range(),
    ) {
        let ranges = ParamRangeSet::new()
            .with(PcmParam::Rate, rate.clone())
            .with(PcmParam::Channels, channels.clone())
            .with(PcmParam::Buffer, buffer.clone());
        match StreamParams::from_ranges(&ranges, &StreamDefaults::default()) {
            Some(params) => {
                prop_assert!(rate.contains(params.rate));
                prop_assert!(channels.contains(params.channels));
                prop_assert!(buffer.contains(params.buffer_frames));
            }
            None => prop_assert!(rate.is_empty() || channels.is_empty() || buffer.is_empty()),
        }
    }
}
