//! Collaborators the core consumes but does not implement.
//!
//! Calendar, location and weather data come from OS services or remote APIs.
//! The core only sees these traits, so hosts can plug in platform adapters
//! and tests can plug in fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, WidgetError};
use crate::events::{Authorization, Event};
use crate::location::CachedLocation;
use crate::weather::HourlyForecast;

/// Read access to the user's calendars.
pub trait CalendarSource: Send + Sync {
    fn authorization(&self) -> Authorization;

    /// Events overlapping `[from, to)`.
    fn fetch_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, WidgetError>;
}

/// Device location service. Accepts one outstanding fresh request at a time.
#[async_trait]
pub trait LocationSource: Send + Sync {
    fn authorization(&self) -> Authorization;

    /// Last fix the OS already holds, if any.
    fn current_cached_fix(&self) -> Option<CachedLocation>;

    async fn request_fresh_fix(&self) -> Result<CachedLocation, WidgetError>;
}

/// Hourly forecast provider.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn forecast(&self, location: &CachedLocation) -> Result<HourlyForecast, WidgetError>;
}

/// Small persisted key-value store shared between the app and its widgets.
///
/// Calls may block on disk. Async callers run them through
/// `tokio::task::spawn_blocking`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}
