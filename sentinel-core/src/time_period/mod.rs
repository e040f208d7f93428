//! Time-period evaluator (spec.md §4.1): `is_valid`, `next_valid`,
//! `next_invalid` over recurring weekday ranges, calendar exceptions, and
//! subtracted exclusions.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};

use crate::model::daterange::{DateRange, DateRangeKind};
use crate::model::timerange::{normalize, TimeRange};
use crate::model::{ObjectGraph, TimePeriod};
use crate::ids::TimePeriodHandle;

/// Horizon bound for `next_valid`/`next_invalid` scans. spec.md requires "at
/// least 4 years"; we use 5 to leave margin for leap-year edge cases.
const HORIZON_DAYS: i64 = 365 * 5;

fn weekday_index(w: Weekday) -> usize {
    // 0 = Sunday, matching spec.md §3.4 and the original engine's tm_wday.
    match w {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .unwrap();
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (next - first).num_days() as u32
}

/// Resolves a possibly-negative day-of-month (`-1` = last day) to an absolute
/// 1-based day, clamped to the month's length.
fn resolve_day(year: i32, month: u32, day: i32) -> u32 {
    let len = days_in_month(year, month) as i32;
    let resolved = if day < 0 { len + day + 1 } else { day };
    resolved.clamp(1, len) as u32
}

fn date_matches(range: &DateRange, date: NaiveDate) -> bool {
    match range.kind {
        DateRangeKind::CalendarDate => {
            let (Some(sy), Some(sm), Some(sd)) =
                (range.start_year, range.start_month, range.start_day)
            else {
                return false;
            };
            let start = NaiveDate::from_ymd_opt(sy, sm, resolve_day(sy, sm, sd));
            let end = match (range.end_year, range.end_month, range.end_day) {
                (Some(ey), Some(em), Some(ed)) => {
                    NaiveDate::from_ymd_opt(ey, em, resolve_day(ey, em, ed))
                }
                _ => start,
            };
            match (start, end) {
                (Some(s), Some(e)) => {
                    if date < s || date > e {
                        return false;
                    }
                    match range.skip_interval {
                        Some(n) if n > 0 => (date - s).num_days() % n as i64 == 0,
                        _ => true,
                    }
                }
                _ => false,
            }
        }
        DateRangeKind::MonthDate => {
            let (Some(sm), Some(sd)) = (range.start_month, range.start_day) else {
                return false;
            };
            let start_day = resolve_day(date.year(), sm, sd);
            let (em, ed) = (
                range.end_month.unwrap_or(sm),
                range.end_day.unwrap_or(sd),
            );
            let end_day = resolve_day(date.year(), em, ed);
            if sm == em {
                date.month() == sm && date.day() >= start_day.min(end_day) && date.day() <= start_day.max(end_day)
            } else {
                (date.month() == sm && date.day() >= start_day)
                    || (date.month() == em && date.day() <= end_day)
                    || (date.month() > sm && date.month() < em)
            }
        }
        DateRangeKind::MonthDay => {
            let Some(sd) = range.start_day else { return false };
            let start_day = resolve_day(date.year(), date.month(), sd);
            let end_day = resolve_day(date.year(), date.month(), range.end_day.unwrap_or(sd));
            date.day() >= start_day.min(end_day) && date.day() <= start_day.max(end_day)
        }
        DateRangeKind::MonthWeekDay => {
            let (Some(sw), Some(sm)) = (range.start_weekday, range.start_month) else {
                return false;
            };
            // start_day here encodes the "nth occurrence" (1-based, negative
            // counts from month end), matching the original engine's overload
            // of the day field for this exception kind.
            let Some(n) = range.start_day else { return false };
            if date.month() != sm || weekday_index(date.weekday()) as u32 != sw {
                return false;
            }
            nth_weekday_in_month(date.year(), sm, sw, n) == Some(date)
        }
        DateRangeKind::WeekDay => {
            let (Some(sw), Some(ew)) = (range.start_weekday, range.end_weekday) else {
                return false;
            };
            let today = weekday_index(date.weekday()) as u32;
            if sw <= ew {
                today >= sw && today <= ew
            } else {
                today >= sw || today <= ew
            }
        }
    }
}

fn nth_weekday_in_month(year: i32, month: u32, weekday: u32, n: i32) -> Option<NaiveDate> {
    let len = days_in_month(year, month);
    let mut matches: Vec<NaiveDate> = Vec::new();
    for day in 1..=len {
        let d = NaiveDate::from_ymd_opt(year, month, day)?;
        if weekday_index(d.weekday()) as u32 == weekday {
            matches.push(d);
        }
    }
    if n > 0 {
        matches.get(n as usize - 1).copied()
    } else if n < 0 {
        let idx = matches.len() as i32 + n;
        if idx >= 0 {
            matches.get(idx as usize).copied()
        } else {
            None
        }
    } else {
        None
    }
}

/// Per-day valid ranges before exclusion subtraction (spec.md §4.1 steps 1-2).
fn day_ranges(tp: &TimePeriod, date: NaiveDate) -> Vec<TimeRange> {
    for kind in [
        DateRangeKind::CalendarDate,
        DateRangeKind::MonthDate,
        DateRangeKind::MonthDay,
        DateRangeKind::MonthWeekDay,
        DateRangeKind::WeekDay,
    ] {
        for range in tp.exceptions_for(kind) {
            if date_matches(range, date) {
                return normalize(range.timeranges.clone());
            }
        }
    }
    normalize(tp.weekdays[weekday_index(date.weekday())].clone())
}

fn subtract(base: Vec<TimeRange>, excluded: &[TimeRange]) -> Vec<TimeRange> {
    let mut result = base;
    for ex in excluded {
        let mut next = Vec::with_capacity(result.len());
        for r in result {
            if ex.end_sec <= r.start_sec || ex.start_sec >= r.end_sec {
                next.push(r);
                continue;
            }
            if ex.start_sec > r.start_sec {
                next.push(TimeRange::new(r.start_sec, ex.start_sec));
            }
            if ex.end_sec < r.end_sec {
                next.push(TimeRange::new(ex.end_sec, r.end_sec));
            }
        }
        result = next;
    }
    result
}

/// Valid ranges for `date` within `tp`, after subtracting every excluded
/// time-period's valid ranges for the same day (spec.md §4.1 step 3,
/// recursive; cycles are rejected at load via `ObjectGraph::validate_time_period_exclusions`).
fn resolved_day_ranges(graph: &ObjectGraph, tp_handle: TimePeriodHandle, date: NaiveDate) -> Vec<TimeRange> {
    let tp = graph.time_period(tp_handle);
    let mut ranges = day_ranges(tp, date);
    for &excl in &tp.exclusions {
        let excluded = resolved_day_ranges(graph, excl, date);
        ranges = subtract(ranges, &excluded);
    }
    ranges
}

pub fn is_valid(graph: &ObjectGraph, instant: DateTime<Utc>, tp_handle: TimePeriodHandle) -> bool {
    let date = instant.date_naive();
    let sec_of_day = instant.num_seconds_from_midnight();
    resolved_day_ranges(graph, tp_handle, date)
        .iter()
        .any(|r| r.contains(sec_of_day))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

/// Next instant >= `instant` that is valid, or `None` ("never", spec.md
/// §4.1) if nothing validates within the horizon.
pub fn next_valid(
    graph: &ObjectGraph,
    instant: DateTime<Utc>,
    tp_handle: TimePeriodHandle,
) -> Option<DateTime<Utc>> {
    let mut date = instant.date_naive();
    let start_sec = instant.num_seconds_from_midnight();

    for day_offset in 0..=HORIZON_DAYS {
        let ranges = resolved_day_ranges(graph, tp_handle, date);
        let floor = if day_offset == 0 { start_sec } else { 0 };
        if let Some(r) = ranges.iter().find(|r| r.end_sec > floor) {
            let candidate_sec = r.start_sec.max(floor);
            return Some(day_start(date) + Duration::seconds(candidate_sec as i64));
        }
        date = date.succ_opt()?;
    }
    None
}

/// Next instant >= `instant` that is invalid (spec.md §4.1).
pub fn next_invalid(
    graph: &ObjectGraph,
    instant: DateTime<Utc>,
    tp_handle: TimePeriodHandle,
) -> Option<DateTime<Utc>> {
    let mut date = instant.date_naive();
    let start_sec = instant.num_seconds_from_midnight();

    for day_offset in 0..=HORIZON_DAYS {
        let ranges = resolved_day_ranges(graph, tp_handle, date);
        let floor = if day_offset == 0 { start_sec } else { 0 };
        let mut cursor = floor;
        for r in &ranges {
            if r.end_sec <= cursor {
                continue;
            }
            if r.start_sec > cursor {
                return Some(day_start(date) + Duration::seconds(cursor as i64));
            }
            cursor = r.end_sec;
        }
        if cursor < 86_400 {
            return Some(day_start(date) + Duration::seconds(cursor as i64));
        }
        date = date.succ_opt()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange as TR;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    fn weekdays_9_to_5(tp: &mut TimePeriod) {
        for d in 1..=5 {
            tp.weekdays[d] = vec![TR::new(9 * 3600, 17 * 3600)];
        }
    }

    #[test]
    fn weekday_range_is_valid_within_hours() {
        let mut graph = ObjectGraph::new();
        let mut tp = TimePeriod::new("24x7-ish", "business hours");
        weekdays_9_to_5(&mut tp);
        let handle = graph.add_time_period(tp);

        // 2024-01-02 is a Tuesday.
        assert!(is_valid(&graph, utc(2024, 1, 2, 10, 0), handle));
        assert!(!is_valid(&graph, utc(2024, 1, 2, 18, 0), handle));
        // 2024-01-06 is a Saturday: no ranges configured.
        assert!(!is_valid(&graph, utc(2024, 1, 6, 10, 0), handle));
    }

    #[test]
    fn next_valid_rolls_forward_to_next_business_day() {
        let mut graph = ObjectGraph::new();
        let mut tp = TimePeriod::new("biz", "biz");
        weekdays_9_to_5(&mut tp);
        let handle = graph.add_time_period(tp);

        // Saturday afternoon should roll to Monday 09:00.
        let sat = utc(2024, 1, 6, 14, 0);
        let next = next_valid(&graph, sat, handle).unwrap();
        assert_eq!(next, utc(2024, 1, 8, 9, 0));
        assert!(is_valid(&graph, next, handle));
    }

    #[test]
    fn exclusion_subtracts_lunch_break() {
        let mut graph = ObjectGraph::new();
        let mut lunch = TimePeriod::new("lunch", "lunch");
        for d in 1..=5 {
            lunch.weekdays[d] = vec![TR::new(12 * 3600, 13 * 3600)];
        }
        let lunch_handle = graph.add_time_period(lunch);

        let mut tp = TimePeriod::new("biz-minus-lunch", "biz");
        weekdays_9_to_5(&mut tp);
        tp.exclusions.push(lunch_handle);
        let handle = graph.add_time_period(tp);

        assert!(is_valid(&graph, utc(2024, 1, 2, 11, 30), handle));
        assert!(!is_valid(&graph, utc(2024, 1, 2, 12, 30), handle));
        assert!(is_valid(&graph, utc(2024, 1, 2, 13, 30), handle));
    }

    #[test]
    fn next_valid_round_trip_law() {
        let mut graph = ObjectGraph::new();
        let mut tp = TimePeriod::new("biz", "biz");
        weekdays_9_to_5(&mut tp);
        let handle = graph.add_time_period(tp);

        let t = utc(2024, 1, 6, 3, 0);
        let r = next_valid(&graph, t, handle).unwrap();
        assert!(is_valid(&graph, r, handle));
    }
}
