// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    zero = { 0, "00:00:00" },
    seconds_only = { 59, "00:00:59" },
    minute_rollover = { 60, "00:01:00" },
    mixed = { 3 * 3600 + 25 * 60 + 7, "03:25:07" },
    over_a_day = { 30 * 3600 + 1, "30:00:01" },
)]
fn formats_hms(secs: u64, expected: &str) {
    assert_eq!(format_hms(Duration::from_secs(secs)), expected);
}
