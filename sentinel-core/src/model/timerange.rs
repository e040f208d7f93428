/// Inclusive seconds-from-midnight interval (spec.md §3.4). `end` may exceed
/// 86400 to express a range that runs past midnight, matching the original
/// engine's `timerange` semantics.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct TimeRange {
    pub start_sec: u32,
    pub end_sec: u32,
}

impl TimeRange {
    pub fn new(start_sec: u32, end_sec: u32) -> Self {
        Self { start_sec, end_sec }
    }

    pub fn contains(&self, sec_of_day: u32) -> bool {
        sec_of_day >= self.start_sec && sec_of_day < self.end_sec
    }
}

/// Sorts and merges overlapping ranges so per-day evaluation can short-circuit
/// on the first non-matching range (spec.md §3.4: "sorted, non-overlapping").
pub fn normalize(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.sort();
    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last_mut() {
            Some(prev) if r.start_sec <= prev.end_sec => {
                prev.end_sec = prev.end_sec.max(r.end_sec);
            }
            _ => merged.push(r),
        }
    }
    merged
}
