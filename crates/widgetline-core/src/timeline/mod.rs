//! Widget timelines.
//!
//! A timeline is an ordered list of `(display_at, snapshot)` entries plus one
//! [`RefreshPolicy`]. The host renders the latest entry whose `display_at` is
//! not in the future and asks for a new timeline as the policy says.
//!
//! This module provides:
//! - Event list timelines driven by event start/end transitions
//! - Weather timelines driven by a fixed fetch schedule
//! - Day and month calendar timelines that flip at midnight

mod calendar;
mod events;
mod weather;

pub use calendar::{
    ordered_weekdays, CalendarTimelineProvider, DaySnapshot, MonthDay, MonthGrid, MonthSnapshot,
    MONTH_GRID_SLOTS,
};
pub use events::{refresh_instants, EventSnapshot, EventTimelineProvider};
pub use weather::{WeatherSnapshot, WeatherState, WeatherTimelineProvider};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WidgetError;
use crate::location::LOCATION_SOURCE;

/// When the host should ask for a new timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Recompute at a fixed instant.
    After(DateTime<Utc>),
    /// Recompute once the last entry has been displayed.
    AtEnd,
}

/// One render-ready state and the instant it becomes current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry<S> {
    pub display_at: DateTime<Utc>,
    pub snapshot: S,
}

impl<S> TimelineEntry<S> {
    pub fn new(display_at: DateTime<Utc>, snapshot: S) -> Self {
        Self {
            display_at,
            snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline<S> {
    pub entries: Vec<TimelineEntry<S>>,
    pub policy: RefreshPolicy,
}

impl<S> Timeline<S> {
    pub fn new(entries: Vec<TimelineEntry<S>>, policy: RefreshPolicy) -> Self {
        Self { entries, policy }
    }

    pub fn single(display_at: DateTime<Utc>, snapshot: S, policy: RefreshPolicy) -> Self {
        Self::new(vec![TimelineEntry::new(display_at, snapshot)], policy)
    }

    /// Entry a host would render at `now`: the latest one already due.
    pub fn entry_at(&self, now: DateTime<Utc>) -> Option<&TimelineEntry<S>> {
        self.entries.iter().rev().find(|e| e.display_at <= now)
    }

    /// Instant at which the host will ask for a new timeline.
    pub fn next_refresh(&self) -> Option<DateTime<Utc>> {
        match self.policy {
            RefreshPolicy::After(at) => Some(at),
            RefreshPolicy::AtEnd => self.entries.last().map(|e| e.display_at),
        }
    }
}

/// Why a snapshot is degraded. Each needs a different user-facing remedy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCondition {
    Generic,
    Location,
}

impl ErrorCondition {
    pub fn classify(err: &WidgetError) -> Self {
        if err.source_name() == LOCATION_SOURCE {
            Self::Location
        } else {
            Self::Generic
        }
    }
}
