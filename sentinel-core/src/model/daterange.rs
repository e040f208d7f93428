use super::timerange::TimeRange;

/// Exception date-range kinds, most specific first (spec.md §4.1 step 1).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum DateRangeKind {
    CalendarDate,
    MonthDate,
    MonthDay,
    MonthWeekDay,
    WeekDay,
}

impl DateRangeKind {
    /// Priority order for exception resolution: lower value wins.
    pub fn priority(self) -> u8 {
        match self {
            DateRangeKind::CalendarDate => 0,
            DateRangeKind::MonthDate => 1,
            DateRangeKind::MonthDay => 2,
            DateRangeKind::MonthWeekDay => 3,
            DateRangeKind::WeekDay => 4,
        }
    }
}

/// A single exception entry (spec.md §3.4). Fields are interpreted per
/// `kind`: e.g. `CalendarDate` uses `start_year/month/day` only; `MonthDay`
/// uses `start_day`/`end_day` (negative values count from month end, as in
/// the original engine; `-1` means "last day of month").
#[derive(Clone, Debug)]
pub struct DateRange {
    pub kind: DateRangeKind,
    pub start_year: Option<i32>,
    pub start_month: Option<u32>,
    pub start_day: Option<i32>,
    pub start_weekday: Option<u32>,
    pub end_year: Option<i32>,
    pub end_month: Option<u32>,
    pub end_day: Option<i32>,
    pub end_weekday: Option<u32>,
    pub skip_interval: Option<u32>,
    pub timeranges: Vec<TimeRange>,
}

impl DateRange {
    pub fn new(kind: DateRangeKind) -> Self {
        Self {
            kind,
            start_year: None,
            start_month: None,
            start_day: None,
            start_weekday: None,
            end_year: None,
            end_month: None,
            end_day: None,
            end_weekday: None,
            skip_interval: None,
            timeranges: Vec::new(),
        }
    }
}
