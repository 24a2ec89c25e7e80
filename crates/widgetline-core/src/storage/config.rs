//! TOML-based configuration.
//!
//! Holds the tunables of every widget timeline:
//! - Event grace window and polling intervals
//! - Weather fetch schedule and retry interval
//! - Location freshness thresholds and request timeout
//! - Local day boundaries (UTC offset, first weekday)
//! - Shared store namespace
//!
//! Configuration is stored at `~/.config/widgetline/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::time::DayCalendar;

/// Event widget configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Minutes an ended event stays visible.
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Re-poll interval while calendar permission is undetermined.
    #[serde(default = "default_undetermined_poll_minutes")]
    pub undetermined_poll_minutes: i64,
    /// Re-poll interval while calendar permission is denied or restricted.
    #[serde(default = "default_denied_poll_minutes")]
    pub denied_poll_minutes: i64,
    #[serde(default = "default_event_retry_minutes")]
    pub error_retry_minutes: i64,
}

/// Weather widget configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Local wall-clock hours at which a fresh forecast is fetched.
    #[serde(default = "default_fetch_hours")]
    pub fetch_hours: Vec<u32>,
    /// How long before the hour its forecast starts showing.
    #[serde(default = "default_display_lead_minutes")]
    pub display_lead_minutes: i64,
    #[serde(default = "default_weather_retry_minutes")]
    pub error_retry_minutes: i64,
    #[serde(default = "default_weather_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,
}

/// Location cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_fresh_minutes")]
    pub fresh_minutes: i64,
    #[serde(default = "default_fallback_minutes")]
    pub fallback_minutes: i64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Local calendar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// 1 = Sunday ... 7 = Saturday.
    #[serde(default = "default_first_weekday")]
    pub first_weekday: u32,
}

/// Shared store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/widgetline/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Upper bound for every minute-valued interval: one day.
const MAX_INTERVAL_MINUTES: i64 = 24 * 60;
/// One week.
const MAX_FALLBACK_MINUTES: i64 = 7 * 24 * 60;
const MAX_WINDOW_DAYS: u32 = 31;
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_FORECAST_HOURS: u32 = 16 * 24;

// Default functions
fn default_grace_minutes() -> i64 {
    10
}
fn default_window_days() -> u32 {
    7
}
fn default_undetermined_poll_minutes() -> i64 {
    15
}
fn default_denied_poll_minutes() -> i64 {
    60
}
fn default_event_retry_minutes() -> i64 {
    15
}
fn default_fetch_hours() -> Vec<u32> {
    vec![6, 10, 14, 18, 22]
}
fn default_display_lead_minutes() -> i64 {
    15
}
fn default_weather_retry_minutes() -> i64 {
    30
}
fn default_weather_endpoint() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_forecast_hours() -> u32 {
    48
}
fn default_fresh_minutes() -> i64 {
    30
}
fn default_fallback_minutes() -> i64 {
    5 * 60
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_first_weekday() -> u32 {
    1
}
fn default_namespace() -> String {
    "group.widgetline".into()
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            grace_minutes: default_grace_minutes(),
            window_days: default_window_days(),
            undetermined_poll_minutes: default_undetermined_poll_minutes(),
            denied_poll_minutes: default_denied_poll_minutes(),
            error_retry_minutes: default_event_retry_minutes(),
        }
    }
}

impl WeatherConfig {
    /// Valid fetch hours, sorted and deduplicated. Falls back to the default
    /// schedule when none are usable.
    pub fn sorted_fetch_hours(&self) -> Vec<u32> {
        let mut hours: Vec<u32> = self.fetch_hours.iter().copied().filter(|h| *h < 24).collect();
        hours.sort_unstable();
        hours.dedup();
        if hours.is_empty() {
            return default_fetch_hours();
        }
        hours
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            fetch_hours: default_fetch_hours(),
            display_lead_minutes: default_display_lead_minutes(),
            error_retry_minutes: default_weather_retry_minutes(),
            endpoint: default_weather_endpoint(),
            forecast_hours: default_forecast_hours(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            fresh_minutes: default_fresh_minutes(),
            fallback_minutes: default_fallback_minutes(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            first_weekday: default_first_weekday(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Default config file location.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/widgetline"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.weather.fetch_hours.is_empty() {
            return Err(invalid("weather.fetch_hours", "at least one fetch hour is required"));
        }
        if self.weather.fetch_hours.iter().any(|h| *h > 23) {
            return Err(invalid("weather.fetch_hours", "hours must be within 0..=23"));
        }
        if !(15..=30).contains(&self.weather.error_retry_minutes) {
            return Err(invalid("weather.error_retry_minutes", "must be within 15..=30"));
        }
        if !(0..60).contains(&self.weather.display_lead_minutes) {
            return Err(invalid("weather.display_lead_minutes", "must be within 0..60"));
        }
        if !(0..=MAX_INTERVAL_MINUTES).contains(&self.events.grace_minutes) {
            return Err(invalid("events.grace_minutes", "must be within 0..=1440"));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.events.window_days) {
            return Err(invalid("events.window_days", "must be within 1..=31"));
        }
        for (key, minutes) in [
            ("events.undetermined_poll_minutes", self.events.undetermined_poll_minutes),
            ("events.denied_poll_minutes", self.events.denied_poll_minutes),
            ("events.error_retry_minutes", self.events.error_retry_minutes),
        ] {
            if !(1..=MAX_INTERVAL_MINUTES).contains(&minutes) {
                return Err(invalid(key, "must be within 1..=1440"));
            }
        }
        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.location.fresh_minutes) {
            return Err(invalid("location.fresh_minutes", "must be within 1..=1440"));
        }
        let fallback_range = self.location.fresh_minutes..=MAX_FALLBACK_MINUTES;
        if !fallback_range.contains(&self.location.fallback_minutes) {
            return Err(invalid(
                "location.fallback_minutes",
                "must be at least the fresh threshold and at most 10080",
            ));
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.location.timeout_secs) {
            return Err(invalid("location.timeout_secs", "must be within 1..=300"));
        }
        if !(1..=MAX_FORECAST_HOURS).contains(&self.weather.forecast_hours) {
            return Err(invalid("weather.forecast_hours", "must be within 1..=384"));
        }
        if !(1..=7).contains(&self.calendar.first_weekday) {
            return Err(invalid("calendar.first_weekday", "must be within 1..=7"));
        }
        self.day_calendar().map(|_| ())
    }

    /// Local calendar described by the `calendar` section.
    ///
    /// # Errors
    /// Returns an error if the UTC offset is out of range.
    pub fn day_calendar(&self) -> Result<DayCalendar, ConfigError> {
        DayCalendar::from_offset_minutes(self.calendar.utc_offset_minutes)
    }
}
