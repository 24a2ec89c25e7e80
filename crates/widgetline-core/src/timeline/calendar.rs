//! Day and month calendar timelines.
//!
//! Both flip at local midnight and carry nothing else that changes during
//! the day, so each timeline has exactly two entries.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::{RefreshPolicy, Timeline, TimelineEntry};
use crate::time::DayCalendar;

/// Number of slots in a month grid: six rows of seven days.
pub const MONTH_GRID_SLOTS: usize = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub as_of: DateTime<Utc>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDay {
    pub value: u32,
    pub is_today: bool,
}

/// Month laid out in weeks, starting on the configured first weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    /// Column headers, in display order.
    pub weekdays: Vec<Weekday>,
    /// Always [`MONTH_GRID_SLOTS`] long. `None` pads before the 1st and after
    /// the last day.
    pub days: Vec<Option<MonthDay>>,
}

impl MonthGrid {
    /// Lay out the month containing `today`.
    ///
    /// `first_weekday` counts from 1 = Sunday to 7 = Saturday.
    pub fn for_date(today: NaiveDate, first_weekday: u32) -> Self {
        let first_weekday = first_weekday.clamp(1, 7);
        let start = today.with_day(1).unwrap_or(today);
        let leading = (start.weekday().number_from_sunday() + 7 - first_weekday) % 7;

        let mut days = vec![None; leading as usize];
        let mut date = start;
        while date.month() == start.month() {
            days.push(Some(MonthDay {
                value: date.day(),
                is_today: date == today,
            }));
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        days.resize(MONTH_GRID_SLOTS, None);

        Self {
            year: start.year(),
            month: start.month(),
            weekdays: ordered_weekdays(first_weekday),
            days,
        }
    }

    pub fn today(&self) -> Option<u32> {
        self.days.iter().flatten().find(|d| d.is_today).map(|d| d.value)
    }
}

/// Weekdays starting from `first_weekday` (1 = Sunday).
pub fn ordered_weekdays(first_weekday: u32) -> Vec<Weekday> {
    let mut day = Weekday::Sun;
    for _ in 1..first_weekday.clamp(1, 7) {
        day = day.succ();
    }
    (0..7)
        .map(|_| {
            let current = day;
            day = day.succ();
            current
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSnapshot {
    pub as_of: DateTime<Utc>,
    pub grid: MonthGrid,
}

/// Builds the calendar widget timelines. Needs no data source.
#[derive(Debug, Clone, Copy)]
pub struct CalendarTimelineProvider {
    calendar: DayCalendar,
    first_weekday: u32,
}

impl CalendarTimelineProvider {
    pub fn new(calendar: DayCalendar, first_weekday: u32) -> Self {
        Self {
            calendar,
            first_weekday,
        }
    }

    fn boundaries(&self, now: DateTime<Utc>) -> [DateTime<Utc>; 2] {
        [
            self.calendar.start_of_day(now),
            self.calendar.start_of_next_day(now),
        ]
    }

    pub fn day_timeline(&self, now: DateTime<Utc>) -> Timeline<DaySnapshot> {
        let entries = self
            .boundaries(now)
            .into_iter()
            .map(|at| {
                TimelineEntry::new(
                    at,
                    DaySnapshot {
                        as_of: at,
                        date: self.calendar.date_of(at),
                    },
                )
            })
            .collect();
        Timeline::new(entries, RefreshPolicy::AtEnd)
    }

    pub fn month_timeline(&self, now: DateTime<Utc>) -> Timeline<MonthSnapshot> {
        let entries = self
            .boundaries(now)
            .into_iter()
            .map(|at| {
                let grid = MonthGrid::for_date(self.calendar.date_of(at), self.first_weekday);
                TimelineEntry::new(at, MonthSnapshot { as_of: at, grid })
            })
            .collect();
        Timeline::new(entries, RefreshPolicy::AtEnd)
    }
}
