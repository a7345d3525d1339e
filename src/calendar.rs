//! Working-day and slot arithmetic for the planning calendar.
//!
//! Days carry four canonical working windows (08:00-10:00, 10:15-12:15,
//! 13:30-15:30, 15:45-17:45). A slot is any interval of the requested
//! duration that starts on a whole hour inside a window and ends within it:
//! a 1-hour course gets two slots per window, a 2-hour course exactly one.

use crate::domain::{ClosingPeriod, DateRange, TimeInterval};
use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};

/// Step between slot starts inside a working window, in minutes.
const SLOT_STEP_MINUTES: u32 = 60;

/// Shorthand for a time literal; all arguments are in-range constants.
pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("time literal out of range")
}

/// The four canonical working windows of a day, earliest first.
pub fn working_windows() -> [TimeInterval; 4] {
    [
        TimeInterval::new(hm(8, 0), hm(10, 0)),
        TimeInterval::new(hm(10, 15), hm(12, 15)),
        TimeInterval::new(hm(13, 30), hm(15, 30)),
        TimeInterval::new(hm(15, 45), hm(17, 45)),
    ]
}

/// The Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// ISO week label, e.g. `2025-W42`.
pub fn week_label(week_start: NaiveDate) -> String {
    let iso = week_start.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

fn is_closed(date: NaiveDate, closings: &[ClosingPeriod]) -> bool {
    closings.iter().any(|c| c.range.contains(date))
}

/// Weekdays of the week starting at `week_start` that fall inside `window`
/// and are not covered by a closing period. Ordered Monday first.
pub fn working_days(
    week_start: NaiveDate,
    window: &DateRange,
    closings: &[ClosingPeriod],
) -> Vec<NaiveDate> {
    (0..5)
        .map(|offset| week_start + Days::new(offset))
        .filter(|date| window.contains(*date) && !is_closed(*date, closings))
        .collect()
}

/// Ordered Mondays of every week intersecting `window` that still has at
/// least one working day after closing-period filtering.
pub fn weeks_in(window: &DateRange, closings: &[ClosingPeriod]) -> Vec<NaiveDate> {
    let mut weeks = Vec::new();
    let mut monday = monday_of(window.start);
    while monday <= window.end {
        if !working_days(monday, window, closings).is_empty() {
            weeks.push(monday);
        }
        monday = monday + Days::new(7);
    }
    weeks
}

/// Candidate `(start, end)` intervals for a session of `duration_hours`,
/// in deterministic calendar order (earliest window, earliest start first).
pub fn slots(duration_hours: u32) -> Vec<TimeInterval> {
    let duration = chrono::Duration::minutes(i64::from(duration_hours) * 60);
    let step = chrono::Duration::minutes(i64::from(SLOT_STEP_MINUTES));
    let mut out = Vec::new();
    for window in working_windows() {
        let mut start = window.start;
        loop {
            let end = start + duration;
            if end > window.end {
                break;
            }
            out.push(TimeInterval::new(start, end));
            start = start + step;
        }
    }
    out
}

/// True when `[start, end)` sits inside one working window and starts on a
/// canonical slot boundary for its own duration.
pub fn is_canonical_slot(start: NaiveTime, end: NaiveTime) -> bool {
    working_windows().iter().any(|window| {
        if !window.covers(start, end) {
            return false;
        }
        let offset = (start - window.start).num_minutes();
        offset >= 0 && offset % i64::from(SLOT_STEP_MINUTES) == 0
    })
}

/// True when `date` is a Monday-to-Friday day.
pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
