//! Calendar events as seen by widgets.
//!
//! This module provides:
//! - The immutable [`Event`] model and its render-time state
//! - Authorization states shared by the calendar and location sources
//! - The [`EventAggregator`] producing sorted, windowed and grouped views

mod aggregator;

pub use aggregator::{DayGroup, EventAggregator, DEFAULT_GRACE_MINUTES, WEEK_DAYS};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Permission state reported by an OS data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Authorized,
    NotDetermined,
    Denied,
    Restricted,
}

impl Authorization {
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }

    /// Map a raw platform status name, treating anything unrecognised as denied.
    pub fn from_platform_status(status: &str) -> Self {
        status.parse().unwrap_or(Self::Denied)
    }
}

impl FromStr for Authorization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "authorized" | "full_access" | "fullaccess" | "authorized_always"
            | "authorized_when_in_use" => Ok(Self::Authorized),
            "not_determined" | "notdetermined" => Ok(Self::NotDetermined),
            "denied" => Ok(Self::Denied),
            "restricted" | "write_only" | "writeonly" => Ok(Self::Restricted),
            other => Err(format!("unknown authorization status: {other}")),
        }
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Authorized => "authorized",
            Self::NotDetermined => "not_determined",
            Self::Denied => "denied",
            Self::Restricted => "restricted",
        };
        f.write_str(s)
    }
}

/// A single calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
}

/// Lifecycle of an event relative to a reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Upcoming,
    InProgress,
    RecentlyEnded,
}

/// Colour class of the status pill drawn next to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PillTone {
    AllDay,
    Upcoming,
    InProgress,
    RecentlyEnded,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            is_all_day: false,
            location: None,
        }
    }

    pub fn all_day(mut self) -> Self {
        self.is_all_day = true;
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn state_at(&self, at: DateTime<Utc>) -> EventState {
        if at < self.start {
            EventState::Upcoming
        } else if at < self.end {
            EventState::InProgress
        } else {
            EventState::RecentlyEnded
        }
    }

    pub fn pill_tone_at(&self, at: DateTime<Utc>) -> PillTone {
        if self.is_all_day {
            return PillTone::AllDay;
        }
        match self.state_at(at) {
            EventState::Upcoming => PillTone::Upcoming,
            EventState::InProgress => PillTone::InProgress,
            EventState::RecentlyEnded => PillTone::RecentlyEnded,
        }
    }
}
