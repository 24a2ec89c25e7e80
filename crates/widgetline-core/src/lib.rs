//! # Widgetline Core Library
//!
//! This library computes home-screen widget timelines: ordered lists of
//! render-ready snapshots, each with the instant it becomes current, plus a
//! policy telling the host when to ask again. The host (a widget extension, a
//! companion app, or the `widgetline-cli` binary) supplies calendar, location,
//! weather and storage adapters through the traits in [`sources`].
//!
//! ## Architecture
//!
//! - **Events**: Aggregation of calendar events into today's list and
//!   per-day groups, with a grace window for events that just ended
//! - **Timeline**: Scheduling of refresh instants for event, weather and
//!   calendar widgets
//! - **Location**: A single-flight location cache with a fresh tier, a
//!   persisted tier, a timeout and a wider fallback window
//! - **Storage**: TOML configuration and a SQLite key-value store shared
//!   between the app and its widgets
//!
//! ## Key Components
//!
//! - [`WidgetService`]: `build_timeline(kind, now)` for every widget kind
//! - [`EventAggregator`]: Filtering, ordering and grouping of events
//! - [`LocationCache`]: Location lookups with request fan-out
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod location;
pub mod settings;
pub mod sources;
pub mod storage;
pub mod time;
pub mod timeline;
pub mod weather;
pub mod widget;

pub use error::{ConfigError, CoreError, StoreError, WidgetError};
pub use events::{Authorization, DayGroup, Event, EventAggregator};
pub use location::{CachedLocation, LocationCache, LocationPolicy};
pub use settings::{SharedSettings, WidgetColorScheme};
pub use sources::{CalendarSource, KeyValueStore, LocationSource, WeatherSource};
pub use storage::{Config, MemoryStore, SqliteStore};
pub use time::{Clock, DayCalendar, ManualClock, SystemClock};
pub use timeline::{ErrorCondition, RefreshPolicy, Timeline, TimelineEntry};
pub use weather::{HourWeather, HourlyForecast, OpenMeteoSource};
pub use widget::{WidgetKind, WidgetService, WidgetTimeline};
