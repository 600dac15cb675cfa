use crate::global_variables::BASE_GREEN_SECS;
use crate::shared_data::{Axis, SampleCounts};

/// Green time in seconds for an axis whose busiest approach holds `axis_max`
/// vehicles, against `other_axis_max` on the opposing axis.
///
/// Only an axis that is strictly busier earns more than the base time:
/// 1 vehicle gets 10s, 2 get 20s, and every vehicle after that adds 10s with
/// no upper cap. Ties go to the base time.
pub fn score(axis_max: u32, other_axis_max: u32) -> u64 {
    if axis_max <= other_axis_max {
        return BASE_GREEN_SECS;
    }
    match axis_max {
        0 => BASE_GREEN_SECS,
        1 => 10,
        n => 20 + (u64::from(n) - 2) * 10,
    }
}

/// Scores `axis` straight from the four raw approach counts.
pub fn score_axis(axis: Axis, counts: &SampleCounts) -> u64 {
    score(
        axis.max_count(counts),
        axis.opposite().max_count(counts),
    )
}
