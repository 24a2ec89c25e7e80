//! File- and flag-backed sources so timelines can be built without OS services.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use widgetline_core::location::LOCATION_SOURCE;
use widgetline_core::{
    Authorization, CachedLocation, CalendarSource, Event, HourlyForecast, LocationSource,
    WeatherSource, WidgetError,
};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    Ok(value)
}

/// Events read from a JSON array.
pub struct JsonCalendar {
    authorization: Authorization,
    events: Vec<Event>,
}

impl JsonCalendar {
    pub fn new(authorization: Authorization, events: Vec<Event>) -> Self {
        Self {
            authorization,
            events,
        }
    }

    pub fn load(path: &Path, authorization: Authorization) -> Result<Self, Box<dyn std::error::Error>> {
        let events: Vec<Event> = read_json(path)?;
        debug!("Loaded {} events from {}", events.len(), path.display());
        Ok(Self::new(authorization, events))
    }
}

impl CalendarSource for JsonCalendar {
    fn authorization(&self) -> Authorization {
        self.authorization
    }

    fn fetch_events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>, WidgetError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.end > from && e.start < to)
            .cloned()
            .collect())
    }
}

/// Coordinates given on the command line, captured at the reference time.
pub struct FixedLocation {
    authorization: Authorization,
    fix: Option<CachedLocation>,
}

impl FixedLocation {
    pub fn new(authorization: Authorization, fix: Option<CachedLocation>) -> Self {
        Self { authorization, fix }
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    fn authorization(&self) -> Authorization {
        self.authorization
    }

    fn current_cached_fix(&self) -> Option<CachedLocation> {
        self.fix.clone()
    }

    async fn request_fresh_fix(&self) -> Result<CachedLocation, WidgetError> {
        self.fix
            .clone()
            .ok_or_else(|| WidgetError::upstream(LOCATION_SOURCE, "no coordinates given"))
    }
}

/// Hourly forecast read from a JSON file.
pub struct FileForecast {
    forecast: HourlyForecast,
}

impl FileForecast {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let forecast: HourlyForecast = read_json(path)?;
        debug!("Loaded {} forecast hours from {}", forecast.hours.len(), path.display());
        Ok(Self { forecast })
    }
}

#[async_trait]
impl WeatherSource for FileForecast {
    async fn forecast(&self, _location: &CachedLocation) -> Result<HourlyForecast, WidgetError> {
        Ok(self.forecast.clone())
    }
}
