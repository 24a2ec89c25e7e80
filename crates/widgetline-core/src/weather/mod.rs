//! Hourly forecast model and weather source adapters.

mod open_meteo;

pub use open_meteo::{condition_for_code, OpenMeteoSource};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::DayCalendar;

/// Name used in errors and logs for the weather collaborator.
pub const WEATHER_SOURCE: &str = "weather";

/// Forecast for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourWeather {
    /// Start of the hour this forecast describes.
    pub hour: DateTime<Utc>,
    pub condition: String,
    /// Apparent ("feels like") temperature in degrees Celsius.
    pub apparent_temperature_c: f64,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub hours: Vec<HourWeather>,
}

impl HourlyForecast {
    pub fn new(hours: Vec<HourWeather>) -> Self {
        Self { hours }
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// First forecast that falls in the same local hour as `hour_start`.
    pub fn for_hour(&self, calendar: &DayCalendar, hour_start: DateTime<Utc>) -> Option<&HourWeather> {
        let target = calendar.hour_start(hour_start);
        self.hours
            .iter()
            .find(|h| calendar.hour_start(h.hour) == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn hour(at: &str, condition: &str) -> HourWeather {
        HourWeather {
            hour: utc(at),
            condition: condition.into(),
            apparent_temperature_c: 20.0,
            symbol: "sun.max.fill".into(),
        }
    }

    #[test]
    fn for_hour_matches_hour_granularity() {
        let forecast = HourlyForecast::new(vec![
            hour("2026-01-13T07:00:00Z", "clear"),
            hour("2026-01-13T08:00:00Z", "cloudy"),
        ]);
        let cal = DayCalendar::utc();
        assert_eq!(
            forecast.for_hour(&cal, utc("2026-01-13T08:00:00Z")).map(|h| h.condition.as_str()),
            Some("cloudy")
        );
        assert_eq!(
            forecast.for_hour(&cal, utc("2026-01-13T07:59:00Z")).map(|h| h.condition.as_str()),
            Some("clear")
        );
        assert!(forecast.for_hour(&cal, utc("2026-01-13T09:00:00Z")).is_none());
    }
}
