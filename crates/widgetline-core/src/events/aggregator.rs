//! Sorted, windowed and grouped views over a raw event list.
//!
//! Everything here is pure: the aggregator borrows an immutable event slice
//! and a reference time, so it can be rebuilt for every timeline entry.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Event;
use crate::time::DayCalendar;

/// How long an ended event stays visible.
pub const DEFAULT_GRACE_MINUTES: i64 = 10;

/// Length of the event widget's look-ahead window, today included.
pub const WEEK_DAYS: u32 = 7;

/// Events starting on one local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub events: Vec<Event>,
}

/// Aggregates events relative to a reference time.
#[derive(Debug, Clone)]
pub struct EventAggregator<'a> {
    events: &'a [Event],
    now: DateTime<Utc>,
    calendar: DayCalendar,
    grace: Duration,
    window_days: u32,
}

impl<'a> EventAggregator<'a> {
    pub fn new(events: &'a [Event], now: DateTime<Utc>, calendar: DayCalendar) -> Self {
        Self {
            events,
            now,
            calendar,
            grace: Duration::minutes(DEFAULT_GRACE_MINUTES),
            window_days: WEEK_DAYS,
        }
    }

    pub fn with_grace_minutes(mut self, minutes: i64) -> Self {
        self.grace = Duration::minutes(minutes.max(0));
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.date_of(self.now)
    }

    /// All-day events first, then by start time. Ties keep input order.
    pub fn sorted_events(&self) -> Vec<Event> {
        let mut sorted = self.events.to_vec();
        sorted.sort_by(|a, b| {
            b.is_all_day
                .cmp(&a.is_all_day)
                .then_with(|| a.start.cmp(&b.start))
        });
        sorted
    }

    /// Events whose start day falls within `[today, today + days)`.
    pub fn window_events(&self, days: u32) -> Vec<Event> {
        let today = self.today();
        let end = today.checked_add_days(Days::new(u64::from(days)));
        self.sorted_events()
            .into_iter()
            .filter(|e| {
                let day = self.calendar.date_of(e.start);
                day >= today && end.map_or(true, |end| day < end)
            })
            .collect()
    }

    /// Whether an event should still be shown at the reference time.
    pub fn is_displayable(&self, event: &Event) -> bool {
        if event.is_all_day {
            event.end > self.now
        } else {
            event.end > self.now - self.grace
        }
    }

    /// Sorted events that have not ended, or ended within the grace window.
    pub fn displayable_events(&self) -> Vec<Event> {
        self.sorted_events()
            .into_iter()
            .filter(|e| self.is_displayable(e))
            .collect()
    }

    /// Events starting today, plus earlier events still running at midnight.
    pub fn today_events(&self) -> Vec<Event> {
        let today = self.today();
        let day_start = self.calendar.start_of(today);
        self.sorted_events()
            .into_iter()
            .filter(|e| {
                let day = self.calendar.date_of(e.start);
                day == today || (day < today && e.end > day_start)
            })
            .collect()
    }

    pub fn today_displayable_events(&self) -> Vec<Event> {
        self.today_events()
            .into_iter()
            .filter(|e| self.is_displayable(e))
            .collect()
    }

    /// Upcoming days of the window, today excluded, one group per start day.
    pub fn group_by_day(&self) -> Vec<DayGroup> {
        let today = self.today();
        let mut by_day: BTreeMap<NaiveDate, Vec<Event>> = BTreeMap::new();
        for event in self.window_events(self.window_days) {
            let day = self.calendar.date_of(event.start);
            if day != today {
                by_day.entry(day).or_default().push(event);
            }
        }

        by_day
            .into_iter()
            .map(|(date, mut events)| {
                events.sort_by_key(|e| e.start);
                DayGroup { date, events }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn timed(id: &str, start: &str, end: &str) -> Event {
        Event::new(id, id, utc(start), utc(end))
    }

    fn all_day(id: &str, day: &str) -> Event {
        let start = utc(&format!("{day}T00:00:00Z"));
        Event::new(id, id, start, start + Duration::days(1)).all_day()
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn sorts_all_day_first_then_by_start() {
        let events = vec![
            timed("late", "2026-01-13T15:00:00Z", "2026-01-13T16:00:00Z"),
            timed("early", "2026-01-13T08:00:00Z", "2026-01-13T09:00:00Z"),
            all_day("holiday", "2026-01-13"),
        ];
        let agg = EventAggregator::new(&events, utc("2026-01-13T07:00:00Z"), DayCalendar::utc());
        assert_eq!(ids(&agg.sorted_events()), vec!["holiday", "early", "late"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let events = vec![
            timed("first", "2026-01-13T09:00:00Z", "2026-01-13T10:00:00Z"),
            timed("second", "2026-01-13T09:00:00Z", "2026-01-13T09:30:00Z"),
            timed("third", "2026-01-13T09:00:00Z", "2026-01-13T11:00:00Z"),
        ];
        let agg = EventAggregator::new(&events, utc("2026-01-13T07:00:00Z"), DayCalendar::utc());
        assert_eq!(ids(&agg.sorted_events()), vec!["first", "second", "third"]);
    }

    #[test]
    fn displayable_keeps_grace_window() {
        let now = utc("2026-01-13T10:00:00Z");
        let events = vec![
            timed("long-gone", "2026-01-13T08:00:00Z", "2026-01-13T09:49:59Z"),
            timed("just-ended", "2026-01-13T09:00:00Z", "2026-01-13T09:55:00Z"),
            timed("running", "2026-01-13T09:30:00Z", "2026-01-13T10:30:00Z"),
            all_day("yesterday", "2026-01-12"),
            all_day("today", "2026-01-13"),
        ];
        let agg = EventAggregator::new(&events, now, DayCalendar::utc());
        assert_eq!(
            ids(&agg.displayable_events()),
            vec!["today", "just-ended", "running"]
        );
    }

    #[test]
    fn grace_boundary_is_exclusive() {
        let now = utc("2026-01-13T10:10:00Z");
        let events = vec![timed("a", "2026-01-13T09:30:00Z", "2026-01-13T10:00:00Z")];
        let agg = EventAggregator::new(&events, now, DayCalendar::utc());
        assert!(agg.displayable_events().is_empty());

        let agg = agg.with_grace_minutes(11);
        assert_eq!(agg.displayable_events().len(), 1);
    }

    #[test]
    fn window_buckets_by_start_day() {
        let now = utc("2026-01-13T09:00:00Z");
        let events = vec![
            timed("past", "2026-01-12T23:00:00Z", "2026-01-13T01:00:00Z"),
            timed("today", "2026-01-13T11:00:00Z", "2026-01-13T12:00:00Z"),
            timed("overnight", "2026-01-19T23:00:00Z", "2026-01-20T02:00:00Z"),
            timed("beyond", "2026-01-20T09:00:00Z", "2026-01-20T10:00:00Z"),
        ];
        let agg = EventAggregator::new(&events, now, DayCalendar::utc());
        assert_eq!(ids(&agg.window_events(7)), vec!["today", "overnight"]);
        assert_eq!(ids(&agg.window_events(1)), vec!["today"]);
    }

    #[test]
    fn today_events_include_carry_over() {
        let now = utc("2026-01-13T09:00:00Z");
        let events = vec![
            timed("overnight", "2026-01-12T23:00:00Z", "2026-01-13T01:00:00Z"),
            timed("finished-yesterday", "2026-01-12T20:00:00Z", "2026-01-12T21:00:00Z"),
            timed("morning", "2026-01-13T08:00:00Z", "2026-01-13T08:55:00Z"),
            timed("tomorrow", "2026-01-14T08:00:00Z", "2026-01-14T09:00:00Z"),
        ];
        let agg = EventAggregator::new(&events, now, DayCalendar::utc());
        assert_eq!(ids(&agg.today_events()), vec!["overnight", "morning"]);
        assert_eq!(ids(&agg.today_displayable_events()), vec!["morning"]);
    }

    #[test]
    fn groups_upcoming_days_excluding_today() {
        let now = utc("2026-01-13T09:00:00Z");
        let events = vec![
            timed("d3-late", "2026-01-15T18:00:00Z", "2026-01-15T19:00:00Z"),
            timed("today", "2026-01-13T11:00:00Z", "2026-01-13T12:00:00Z"),
            timed("d2", "2026-01-14T08:00:00Z", "2026-01-14T09:00:00Z"),
            all_day("d3-all-day", "2026-01-15"),
            timed("d3-early", "2026-01-15T07:00:00Z", "2026-01-15T08:00:00Z"),
            timed("outside", "2026-01-21T07:00:00Z", "2026-01-21T08:00:00Z"),
        ];
        let agg = EventAggregator::new(&events, now, DayCalendar::utc());
        let groups = agg.group_by_day();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2026, 1, 14).unwrap());
        assert_eq!(ids(&groups[0].events), vec!["d2"]);
        assert_eq!(groups[1].date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(
            ids(&groups[1].events),
            vec!["d3-all-day", "d3-early", "d3-late"]
        );
    }

    #[test]
    fn local_offset_moves_day_buckets() {
        // 23:30Z on the 13th is 01:30 on the 14th at UTC+2.
        let events = vec![timed("late", "2026-01-13T23:30:00Z", "2026-01-14T00:30:00Z")];
        let now = utc("2026-01-13T09:00:00Z");

        let utc_groups = EventAggregator::new(&events, now, DayCalendar::utc()).group_by_day();
        assert!(utc_groups.is_empty());

        let plus_two = DayCalendar::from_offset_minutes(120).unwrap();
        let groups = EventAggregator::new(&events, now, plus_two).group_by_day();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2026, 1, 14).unwrap());
    }
}
