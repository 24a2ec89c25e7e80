//! Open-Meteo hourly forecast adapter.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{HourWeather, HourlyForecast, WEATHER_SOURCE};
use crate::error::WidgetError;
use crate::location::CachedLocation;
use crate::sources::WeatherSource;
use crate::storage::WeatherConfig;

/// Fetches hourly apparent temperature and WMO weather codes.
pub struct OpenMeteoSource {
    endpoint: String,
    forecast_hours: u32,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<i64>,
    apparent_temperature: Vec<Option<f64>>,
    weather_code: Vec<Option<u8>>,
}

impl OpenMeteoSource {
    pub fn new(endpoint: impl Into<String>, forecast_hours: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            forecast_hours,
            http_client: Client::new(),
        }
    }

    pub fn from_config(config: &WeatherConfig) -> Self {
        Self::new(config.endpoint.clone(), config.forecast_hours)
    }

    fn request_url(&self, location: &CachedLocation) -> Result<Url, WidgetError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("hourly", "apparent_temperature,weather_code".to_string()),
                ("forecast_hours", self.forecast_hours.to_string()),
                ("timeformat", "unixtime".to_string()),
                ("timezone", "GMT".to_string()),
            ],
        )
        .map_err(|e| WidgetError::upstream(WEATHER_SOURCE, format!("invalid endpoint: {e}")))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoSource {
    async fn forecast(&self, location: &CachedLocation) -> Result<HourlyForecast, WidgetError> {
        let url = self.request_url(location)?;
        debug!("Fetching forecast from {url}");

        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WidgetError::upstream(WEATHER_SOURCE, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WidgetError::upstream(WEATHER_SOURCE, format!("HTTP {status}")));
        }

        let body: ForecastResponse = resp
            .json()
            .await
            .map_err(|e| WidgetError::upstream(WEATHER_SOURCE, e.to_string()))?;

        let hourly = body.hourly;
        let hours = hourly
            .time
            .iter()
            .zip(hourly.apparent_temperature.iter())
            .zip(hourly.weather_code.iter())
            .filter_map(|((time, temp), code)| {
                let hour = DateTime::from_timestamp(*time, 0)?;
                let (condition, symbol) = condition_for_code((*code)?);
                Some(HourWeather {
                    hour,
                    condition: condition.to_string(),
                    apparent_temperature_c: (*temp)?,
                    symbol: symbol.to_string(),
                })
            })
            .collect();

        Ok(HourlyForecast::new(hours))
    }
}

/// Condition label and symbol name for a WMO weather interpretation code.
pub fn condition_for_code(code: u8) -> (&'static str, &'static str) {
    match code {
        0 => ("clear", "sun.max.fill"),
        1 | 2 => ("partly cloudy", "cloud.sun.fill"),
        3 => ("cloudy", "cloud.fill"),
        45 | 48 => ("foggy", "cloud.fog.fill"),
        51 | 53 | 55 | 56 | 57 => ("drizzle", "cloud.drizzle.fill"),
        65 | 82 => ("heavy rain", "cloud.heavyrain.fill"),
        61 | 63 | 66 | 67 | 80 | 81 => ("rain", "cloud.rain.fill"),
        71 | 73 | 75 | 77 | 85 | 86 => ("snow", "cloud.snow.fill"),
        95 | 96 | 99 => ("thunderstorms", "cloud.bolt.rain.fill"),
        _ => ("unknown", "questionmark.square.dashed"),
    }
}
