// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn counter_starts_at_zero_and_increments() {
    let counter = RecordCounter::new();
    assert_eq!(counter.next(), 0);
    assert_eq!(counter.next(), 1);
    assert_eq!(counter.peek(), 2);
}

#[test]
fn split_produces_decimal_groups() {
    let groups = CounterGroups::split(123_456_789);
    assert_eq!(groups, CounterGroups { sup: 123, high: 456, low: 789 });
    assert_eq!(groups.to_string(), "123 456 789");
}

#[test]
fn split_zero_pads_display() {
    assert_eq!(CounterGroups::split(0).to_string(), "000 000 000");
    assert_eq!(CounterGroups::split(1_002_003).to_string(), "001 002 003");
}

#[test]
fn display_is_modular_near_the_top_of_the_range() {
    // One more increment past i64::MAX must still render three sane groups.
    let at_limit = CounterGroups::split((i64::MAX as u64) - 1);
    let past_limit = CounterGroups::split(i64::MAX as u64);
    assert_eq!(at_limit.to_string().len(), 11);
    assert_eq!(past_limit.to_string().len(), 11);
    assert_ne!(at_limit, past_limit);
}

proptest! {
    #[test]
    fn groups_are_always_three_digits(counter in any::<u64>()) {
        let groups = CounterGroups::split(counter);
        prop_assert!(groups.sup < 1_000);
        prop_assert!(groups.high < 1_000);
        prop_assert!(groups.low < 1_000);
        prop_assert_eq!(groups.to_string().len(), 11);
    }

    #[test]
    fn groups_reconstruct_counter_mod_a_billion(counter in any::<u64>()) {
        let groups = CounterGroups::split(counter);
        let rebuilt =
            groups.sup as u64 * 1_000_000 + groups.high as u64 * 1_000 + groups.low as u64;
        prop_assert_eq!(rebuilt, counter % 1_000_000_000);
    }
}
