//! Per-widget entry point.
//!
//! [`WidgetService`] owns one provider per data domain and answers
//! `build_timeline(kind, now)` for any [`WidgetKind`]. Every failure has
//! already been folded into a degraded snapshot by the time a timeline gets
//! here, so the call cannot fail.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::location::{LocationCache, LocationPolicy};
use crate::sources::{CalendarSource, KeyValueStore, LocationSource, WeatherSource};
use crate::storage::Config;
use crate::time::{Clock, DayCalendar};
use crate::timeline::{
    CalendarTimelineProvider, DaySnapshot, EventSnapshot, EventTimelineProvider, MonthSnapshot,
    RefreshPolicy, Timeline, WeatherSnapshot, WeatherTimelineProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    /// Today's date, large.
    Calendar,
    /// Today's date, compact.
    MinimalCalendar,
    MonthCalendar,
    Events,
    Weather,
}

impl WidgetKind {
    pub const ALL: [Self; 5] = [
        Self::Calendar,
        Self::MinimalCalendar,
        Self::MonthCalendar,
        Self::Events,
        Self::Weather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::MinimalCalendar => "minimal-calendar",
            Self::MonthCalendar => "month-calendar",
            Self::Events => "events",
            Self::Weather => "weather",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Calendar => "Calendar",
            Self::MinimalCalendar => "Minimal Calendar",
            Self::MonthCalendar => "Month Calendar",
            Self::Events => "Upcoming Events",
            Self::Weather => "Weather",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown widget kind '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// A timeline for one widget kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "timeline", rename_all = "kebab-case")]
pub enum WidgetTimeline {
    Calendar(Timeline<DaySnapshot>),
    MinimalCalendar(Timeline<DaySnapshot>),
    MonthCalendar(Timeline<MonthSnapshot>),
    Events(Timeline<EventSnapshot>),
    Weather(Timeline<WeatherSnapshot>),
}

impl WidgetTimeline {
    pub fn kind(&self) -> WidgetKind {
        match self {
            Self::Calendar(_) => WidgetKind::Calendar,
            Self::MinimalCalendar(_) => WidgetKind::MinimalCalendar,
            Self::MonthCalendar(_) => WidgetKind::MonthCalendar,
            Self::Events(_) => WidgetKind::Events,
            Self::Weather(_) => WidgetKind::Weather,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Calendar(t) | Self::MinimalCalendar(t) => t.entries.len(),
            Self::MonthCalendar(t) => t.entries.len(),
            Self::Events(t) => t.entries.len(),
            Self::Weather(t) => t.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> RefreshPolicy {
        match self {
            Self::Calendar(t) | Self::MinimalCalendar(t) => t.policy,
            Self::MonthCalendar(t) => t.policy,
            Self::Events(t) => t.policy,
            Self::Weather(t) => t.policy,
        }
    }

    pub fn next_refresh(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Calendar(t) | Self::MinimalCalendar(t) => t.next_refresh(),
            Self::MonthCalendar(t) => t.next_refresh(),
            Self::Events(t) => t.next_refresh(),
            Self::Weather(t) => t.next_refresh(),
        }
    }
}

/// Builds timelines for every widget kind from one set of collaborators.
pub struct WidgetService {
    calendar: CalendarTimelineProvider,
    events: EventTimelineProvider,
    weather: WeatherTimelineProvider,
    day_calendar: DayCalendar,
}

impl WidgetService {
    /// Wire providers from configuration. Must run inside a tokio runtime:
    /// the location cache actor is spawned here.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: &Config,
        calendar_source: Arc<dyn CalendarSource>,
        location_source: Arc<dyn LocationSource>,
        weather_source: Arc<dyn WeatherSource>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let day_calendar = config.day_calendar()?;

        let location = LocationCache::spawn(
            location_source,
            store,
            clock,
            LocationPolicy::from(&config.location),
        );

        Ok(Self {
            calendar: CalendarTimelineProvider::new(day_calendar, config.calendar.first_weekday),
            events: EventTimelineProvider::new(calendar_source, day_calendar, config.events.clone()),
            weather: WeatherTimelineProvider::new(
                location,
                weather_source,
                day_calendar,
                &config.weather,
            ),
            day_calendar,
        })
    }

    pub async fn build_timeline(&self, kind: WidgetKind, now: DateTime<Utc>) -> WidgetTimeline {
        let timeline = match kind {
            WidgetKind::Calendar => WidgetTimeline::Calendar(self.calendar.day_timeline(now)),
            WidgetKind::MinimalCalendar => {
                WidgetTimeline::MinimalCalendar(self.calendar.day_timeline(now))
            }
            WidgetKind::MonthCalendar => {
                WidgetTimeline::MonthCalendar(self.calendar.month_timeline(now))
            }
            WidgetKind::Events => WidgetTimeline::Events(self.events.build_timeline(now)),
            WidgetKind::Weather => WidgetTimeline::Weather(self.weather.build_timeline(now).await),
        };
        info!(
            "Built {kind} timeline: {} entries, policy {:?}",
            timeline.len(),
            timeline.policy()
        );
        timeline
    }

    /// Sample timeline for widget galleries. Touches no collaborator.
    pub fn placeholder(&self, kind: WidgetKind, now: DateTime<Utc>) -> WidgetTimeline {
        match kind {
            WidgetKind::Calendar => WidgetTimeline::Calendar(self.calendar.day_timeline(now)),
            WidgetKind::MinimalCalendar => {
                WidgetTimeline::MinimalCalendar(self.calendar.day_timeline(now))
            }
            WidgetKind::MonthCalendar => {
                WidgetTimeline::MonthCalendar(self.calendar.month_timeline(now))
            }
            WidgetKind::Events => WidgetTimeline::Events(Timeline::single(
                now,
                EventSnapshot::placeholder(now, self.day_calendar),
                RefreshPolicy::AtEnd,
            )),
            WidgetKind::Weather => WidgetTimeline::Weather(Timeline::single(
                now,
                WeatherSnapshot::placeholder(now),
                RefreshPolicy::AtEnd,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_names() {
        assert_eq!("events".parse::<WidgetKind>().unwrap(), WidgetKind::Events);
        assert_eq!(
            "Month_Calendar".parse::<WidgetKind>().unwrap(),
            WidgetKind::MonthCalendar
        );
        let err = "clock".parse::<WidgetKind>().unwrap_err();
        assert!(err.contains("minimal-calendar"));
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in WidgetKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
