//! Round partitioning across device lanes.
//!
//! The witness budget is split into contiguous, order-preserving ranges, one
//! per lane: `base = rounds / lanes` everywhere, with the remainder handed
//! out one extra round each to the lowest-indexed lanes. The compute kernel
//! carries the same function in WGSL; this is the host mirror the tests and
//! the dispatcher use, and the two must stay in lockstep.

use std::ops::Range;

/// Half-open range of round indices assigned to `lane_index`.
///
/// Holds for any `rounds >= 0` and `total_lanes >= 1`: the union of all
/// lanes' ranges is exactly `[0, rounds)` with no gaps or overlaps, and no
/// two lanes' lengths differ by more than one. Lanes past the budget get an
/// empty range and do no work.
pub fn lane_range(rounds: u32, total_lanes: u32, lane_index: u32) -> Range<u32> {
    debug_assert!(total_lanes >= 1, "partition requires at least one lane");
    debug_assert!(lane_index < total_lanes, "lane index out of range");
    let base = rounds / total_lanes;
    let remainder = rounds % total_lanes;
    let start = lane_index * base + lane_index.min(remainder);
    let count = base + u32::from(lane_index < remainder);
    start..start + count
}

/// Workgroups needed to cover `rounds` lanes of `workgroup_size` threads.
pub fn workgroups_for(rounds: u32, workgroup_size: u32) -> u32 {
    debug_assert!(workgroup_size >= 1);
    rounds.div_ceil(workgroup_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(rounds: u32, lanes: u32) -> Vec<u32> {
        (0..lanes).map(|i| lane_range(rounds, lanes, i).len() as u32).collect()
    }

    #[test]
    fn one_round_per_lane_when_budget_matches() {
        for lane in 0..64 {
            assert_eq!(lane_range(64, 64, lane), lane..lane + 1);
        }
    }

    #[test]
    fn remainder_goes_to_lowest_lanes() {
        // 10 rounds over 4 lanes: counts {3, 3, 2, 2}
        assert_eq!(counts(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(lane_range(10, 4, 0), 0..3);
        assert_eq!(lane_range(10, 4, 1), 3..6);
        assert_eq!(lane_range(10, 4, 2), 6..8);
        assert_eq!(lane_range(10, 4, 3), 8..10);
    }

    #[test]
    fn surplus_lanes_get_empty_ranges() {
        let ranges: Vec<_> = (0..8).map(|i| lane_range(3, 8, i)).collect();
        assert_eq!(ranges[0], 0..1);
        assert_eq!(ranges[1], 1..2);
        assert_eq!(ranges[2], 2..3);
        for r in &ranges[3..] {
            assert!(r.is_empty(), "lane past the budget must be idle, got {:?}", r);
        }
    }

    #[test]
    fn zero_rounds_means_all_lanes_idle() {
        for lane in 0..5 {
            assert!(lane_range(0, 5, lane).is_empty());
        }
    }

    #[test]
    fn ranges_are_contiguous_and_cover_budget() {
        for &(rounds, lanes) in &[(1u32, 1u32), (7, 3), (64, 256), (100, 7), (256, 64)] {
            let mut next = 0;
            for lane in 0..lanes {
                let r = lane_range(rounds, lanes, lane);
                assert_eq!(r.start, next, "gap before lane {} ({}/{})", lane, rounds, lanes);
                next = r.end;
            }
            assert_eq!(next, rounds, "ranges do not cover the budget ({}/{})", rounds, lanes);
        }
    }

    #[test]
    fn workgroup_count_rounds_up() {
        assert_eq!(workgroups_for(64, 64), 1);
        assert_eq!(workgroups_for(65, 64), 2);
        assert_eq!(workgroups_for(1, 64), 1);
        assert_eq!(workgroups_for(0, 64), 0);
    }
}
