use std::collections::HashMap;

use super::daterange::{DateRange, DateRangeKind};
use super::timerange::TimeRange;
use crate::ids::TimePeriodHandle;

/// Time-period object (spec.md §3.4). `weekdays[0]` is Sunday, matching the
/// original engine's `tm_wday` convention.
#[derive(Clone, Debug)]
pub struct TimePeriod {
    pub name: String,
    pub alias: String,
    pub weekdays: [Vec<TimeRange>; 7],
    pub exceptions: HashMap<DateRangeKind, Vec<DateRange>>,
    /// Time periods whose valid times are subtracted from this one
    /// (spec.md §3.4 "exclusions"); recursive, cycles rejected at load.
    pub exclusions: Vec<TimePeriodHandle>,
}

impl TimePeriod {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            weekdays: Default::default(),
            exceptions: HashMap::new(),
            exclusions: Vec::new(),
        }
    }

    pub fn exceptions_for(&self, kind: DateRangeKind) -> &[DateRange] {
        self.exceptions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}
