//! Event list timeline.
//!
//! Every entry carries the same week of events; only `as_of` differs. Event
//! state (pill tone, displayable) is derived from `as_of` at render time, so
//! entries are needed exactly at the instants where that derivation changes:
//! an event starting, ending, or leaving the grace window.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ErrorCondition, RefreshPolicy, Timeline, TimelineEntry};
use crate::error::WidgetError;
use crate::events::{Authorization, Event, EventAggregator, DEFAULT_GRACE_MINUTES, WEEK_DAYS};
use crate::sources::CalendarSource;
use crate::storage::EventsConfig;
use crate::time::DayCalendar;

/// Event data for one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub as_of: DateTime<Utc>,
    pub events: Vec<Event>,
    pub authorization: Authorization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCondition>,
    /// Minutes an ended event stays visible in [`EventSnapshot::view`].
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

fn default_grace_minutes() -> i64 {
    DEFAULT_GRACE_MINUTES
}

fn default_window_days() -> u32 {
    WEEK_DAYS
}

impl EventSnapshot {
    pub fn new(as_of: DateTime<Utc>, events: Vec<Event>, authorization: Authorization) -> Self {
        Self {
            as_of,
            events,
            authorization,
            error: None,
            grace_minutes: DEFAULT_GRACE_MINUTES,
            window_days: WEEK_DAYS,
        }
    }

    /// Use the given event settings when rendering this snapshot.
    pub fn with_settings(mut self, config: &EventsConfig) -> Self {
        self.grace_minutes = config.grace_minutes;
        self.window_days = config.window_days;
        self
    }

    pub fn is_authorized(&self) -> bool {
        self.authorization.is_authorized()
    }

    /// Aggregated views evaluated at this snapshot's `as_of`.
    pub fn view(&self, calendar: DayCalendar) -> EventAggregator<'_> {
        EventAggregator::new(&self.events, self.as_of, calendar)
            .with_grace_minutes(self.grace_minutes)
            .with_window_days(self.window_days)
    }

    /// Sample data for widget galleries.
    pub fn placeholder(now: DateTime<Utc>, calendar: DayCalendar) -> Self {
        let today = calendar.start_of_day(now);
        let at = |hours: i64, minutes: i64| today + Duration::hours(hours) + Duration::minutes(minutes);
        let events = vec![
            Event::new("sample-standup", "Team Standup", at(9, 0), at(9, 15)),
            Event::new("sample-lunch", "Lunch with Alex", at(12, 0), at(13, 0)),
            Event::new("sample-review", "Project Review", at(15, 0), at(16, 0)),
            Event::new("sample-client", "Client Meeting", at(16, 30), at(17, 30))
                .at("Conference Room A"),
            Event::new("sample-jog", "Morning Jog", at(31, 0), at(32, 0)),
            Event::new("sample-planning", "Quarterly Planning", at(34, 0), at(36, 0)),
            Event::new("sample-dentist", "Dentist Appointment", at(62, 0), at(63, 0)),
        ];
        Self::new(now, events, Authorization::Authorized)
    }
}

/// Instants after `now` and before the next local midnight at which some
/// event changes state, followed by that midnight.
pub fn refresh_instants(
    events: &[Event],
    now: DateTime<Utc>,
    calendar: DayCalendar,
    grace: Duration,
) -> Vec<DateTime<Utc>> {
    let next_day = calendar.start_of_next_day(now);
    let mut instants = BTreeSet::new();
    instants.insert(next_day);

    for event in events {
        for candidate in [event.start, event.end, event.end + grace] {
            if candidate > now && candidate < next_day {
                instants.insert(candidate);
            }
        }
    }

    instants.into_iter().filter(|t| *t > now).collect()
}

/// Builds event list timelines from a calendar source.
pub struct EventTimelineProvider {
    source: Arc<dyn CalendarSource>,
    calendar: DayCalendar,
    config: EventsConfig,
}

impl EventTimelineProvider {
    pub fn new(source: Arc<dyn CalendarSource>, calendar: DayCalendar, config: EventsConfig) -> Self {
        Self {
            source,
            calendar,
            config,
        }
    }

    fn grace(&self) -> Duration {
        Duration::minutes(self.config.grace_minutes.max(0))
    }

    fn snapshot_at(
        &self,
        at: DateTime<Utc>,
        events: Vec<Event>,
        authorization: Authorization,
    ) -> EventSnapshot {
        EventSnapshot::new(at, events, authorization).with_settings(&self.config)
    }

    fn fetch_window(&self, now: DateTime<Utc>) -> Result<Vec<Event>, WidgetError> {
        let from = self.calendar.start_of_day(now);
        let to = from + Duration::days(i64::from(self.config.window_days.max(1)));
        self.source.fetch_events(from, to)
    }

    pub fn build_timeline(&self, now: DateTime<Utc>) -> Timeline<EventSnapshot> {
        let authorization = self.source.authorization();
        match authorization {
            Authorization::Authorized => {}
            Authorization::NotDetermined => {
                debug!("Calendar permission undetermined, polling");
                let retry = now + Duration::minutes(self.config.undetermined_poll_minutes);
                return Timeline::single(
                    now,
                    self.snapshot_at(now, Vec::new(), authorization),
                    RefreshPolicy::After(retry),
                );
            }
            Authorization::Denied | Authorization::Restricted => {
                debug!("Calendar permission {authorization}, polling");
                let retry = now + Duration::minutes(self.config.denied_poll_minutes);
                return Timeline::single(
                    now,
                    self.snapshot_at(now, Vec::new(), authorization),
                    RefreshPolicy::After(retry),
                );
            }
        }

        let events = match self.fetch_window(now) {
            Ok(events) => events,
            Err(e) => {
                warn!("Calendar fetch failed: {e}");
                let mut snapshot = self.snapshot_at(now, Vec::new(), authorization);
                snapshot.error = Some(ErrorCondition::classify(&e));
                let retry = now + Duration::minutes(self.config.error_retry_minutes);
                return Timeline::single(now, snapshot, RefreshPolicy::After(retry));
            }
        };

        let instants = refresh_instants(&events, now, self.calendar, self.grace());
        info!(
            "Event timeline: {} events, {} future entries",
            events.len(),
            instants.len()
        );

        let mut entries = Vec::with_capacity(instants.len() + 1);
        entries.push(TimelineEntry::new(
            now,
            self.snapshot_at(now, events.clone(), authorization),
        ));
        for at in instants {
            entries.push(TimelineEntry::new(
                at,
                self.snapshot_at(at, events.clone(), authorization),
            ));
        }

        Timeline::new(entries, RefreshPolicy::AtEnd)
    }
}
