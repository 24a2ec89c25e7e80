//! Weather timeline.
//!
//! A forecast is fetched at fixed local hours only. Between fetches the
//! timeline walks the hourly forecast: each hour is shown from `lead` minutes
//! before it starts (the 7am forecast appears at 6:45), and the hour already
//! in progress is shown immediately.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ErrorCondition, RefreshPolicy, Timeline, TimelineEntry};
use crate::location::LocationCache;
use crate::sources::WeatherSource;
use crate::storage::WeatherConfig;
use crate::time::DayCalendar;
use crate::weather::{HourWeather, HourlyForecast};

/// What the weather widget shows at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherState {
    Forecast(HourWeather),
    Unavailable { condition: ErrorCondition },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub as_of: DateTime<Utc>,
    pub state: WeatherState,
}

impl WeatherSnapshot {
    pub fn forecast(as_of: DateTime<Utc>, hour: &HourWeather) -> Self {
        Self {
            as_of,
            state: WeatherState::Forecast(hour.clone()),
        }
    }

    pub fn unavailable(as_of: DateTime<Utc>, condition: ErrorCondition) -> Self {
        Self {
            as_of,
            state: WeatherState::Unavailable { condition },
        }
    }

    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self::forecast(
            now,
            &HourWeather {
                hour: now,
                condition: "cloudy".into(),
                apparent_temperature_c: 25.0,
                symbol: "cloud.sun.fill".into(),
            },
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, WeatherState::Unavailable { .. })
    }
}

/// Builds weather timelines from the location cache and a forecast source.
pub struct WeatherTimelineProvider {
    location: LocationCache,
    source: Arc<dyn WeatherSource>,
    calendar: DayCalendar,
    fetch_hours: Vec<u32>,
    lead: Duration,
    retry: Duration,
}

impl WeatherTimelineProvider {
    pub fn new(
        location: LocationCache,
        source: Arc<dyn WeatherSource>,
        calendar: DayCalendar,
        config: &WeatherConfig,
    ) -> Self {
        Self {
            location,
            source,
            calendar,
            fetch_hours: config.sorted_fetch_hours(),
            lead: Duration::minutes(config.display_lead_minutes),
            retry: Duration::minutes(config.error_retry_minutes),
        }
    }

    /// First fetch hour strictly after the current local hour, else the first
    /// fetch hour tomorrow.
    pub fn next_fetch_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = self.calendar.hour_of(now);
        let today = self.calendar.date_of(now);
        match self.fetch_hours.iter().find(|h| **h > hour) {
            Some(next) => self.calendar.at_hour(today, *next),
            None => {
                let first = self.fetch_hours.first().copied().unwrap_or(6);
                self.calendar.at_hour(today, first) + Duration::days(1)
            }
        }
    }

    /// Forecast hours to walk before the next fetch, the fetch hour included.
    pub fn hours_until_next_fetch(&self, now: DateTime<Utc>) -> i64 {
        let whole_hours = (self.next_fetch_time(now) - now).num_hours();
        (whole_hours + 1).max(1)
    }

    /// Entries for one fetched forecast. Never empty.
    pub fn entries_from_forecast(
        &self,
        forecast: &HourlyForecast,
        now: DateTime<Utc>,
    ) -> Vec<TimelineEntry<WeatherSnapshot>> {
        let hours = self.hours_until_next_fetch(now);
        debug!("Generating up to {hours} weather entries");

        let current_hour = self.calendar.hour_start(now);
        let mut entries = Vec::new();

        if let Some(weather) = forecast.for_hour(&self.calendar, current_hour) {
            entries.push(TimelineEntry::new(now, WeatherSnapshot::forecast(now, weather)));
        }

        for offset in 0..hours {
            let forecast_hour = current_hour + Duration::hours(offset + 1);
            let Some(weather) = forecast.for_hour(&self.calendar, forecast_hour) else {
                continue;
            };
            let display_at = forecast_hour - self.lead;
            if display_at > now {
                entries.push(TimelineEntry::new(
                    display_at,
                    WeatherSnapshot::forecast(display_at, weather),
                ));
            }
        }

        if entries.is_empty() {
            warn!("Forecast had no usable hours");
            entries.push(TimelineEntry::new(
                now,
                WeatherSnapshot::unavailable(now, ErrorCondition::Generic),
            ));
        }

        entries
    }

    pub async fn build_timeline(&self, now: DateTime<Utc>) -> Timeline<WeatherSnapshot> {
        let location = match self.location.get_location().await {
            Ok(location) => location,
            Err(e) => {
                warn!("Location unavailable for weather: {e}");
                return self.degraded(now, ErrorCondition::classify(&e));
            }
        };
        info!("Location resolved: {}", location.coordinate_string());

        let forecast = match self.source.forecast(&location).await {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!("Failed to fetch weather: {e}");
                return self.degraded(now, ErrorCondition::classify(&e));
            }
        };
        info!("Hourly forecast fetched ({} hours)", forecast.hours.len());

        let entries = self.entries_from_forecast(&forecast, now);
        let next_fetch = self.next_fetch_time(now);
        info!("Next weather fetch scheduled for {next_fetch}");
        Timeline::new(entries, RefreshPolicy::After(next_fetch))
    }

    fn degraded(&self, now: DateTime<Utc>, condition: ErrorCondition) -> Timeline<WeatherSnapshot> {
        Timeline::single(
            now,
            WeatherSnapshot::unavailable(now, condition),
            RefreshPolicy::After(now + self.retry),
        )
    }
}
