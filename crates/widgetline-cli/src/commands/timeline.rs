use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Args;
use tracing::info;
use widgetline_core::{
    Authorization, CachedLocation, Clock, Config, KeyValueStore, ManualClock, MemoryStore,
    OpenMeteoSource, SystemClock, WeatherSource, WidgetKind, WidgetService,
};

use super::{open_store, CommandResult};
use crate::fixtures::{FileForecast, FixedLocation, JsonCalendar};

#[derive(Args)]
pub struct TimelineArgs {
    /// Widget kind: calendar, minimal-calendar, month-calendar, events, weather
    kind: WidgetKind,
    /// Reference time (RFC 3339), defaults to now
    #[arg(long)]
    now: Option<DateTime<Utc>>,
    /// JSON file holding an array of events
    #[arg(long)]
    events: Option<PathBuf>,
    /// Calendar permission state
    #[arg(long, default_value = "authorized")]
    calendar_auth: Authorization,
    /// JSON file holding an hourly forecast; queries Open-Meteo when absent
    #[arg(long)]
    forecast: Option<PathBuf>,
    /// Current latitude
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Current longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Location permission state
    #[arg(long, default_value = "authorized")]
    location_auth: Authorization,
    /// Print the gallery placeholder instead of live data
    #[arg(long)]
    placeholder: bool,
    /// Keep the location cache in memory instead of the shared database
    #[arg(long)]
    ephemeral: bool,
}

pub async fn run(args: TimelineArgs) -> CommandResult {
    let config = Config::load()?;
    let clock: Arc<dyn Clock> = match args.now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };
    let now = clock.now();

    let calendar = match &args.events {
        Some(path) => JsonCalendar::load(path, args.calendar_auth)?,
        None => JsonCalendar::new(args.calendar_auth, Vec::new()),
    };

    let fix = args
        .lat
        .zip(args.lon)
        .map(|(lat, lon)| CachedLocation::new(lat, lon, now));
    let location = FixedLocation::new(args.location_auth, fix);

    let weather: Arc<dyn WeatherSource> = match &args.forecast {
        Some(path) => Arc::new(FileForecast::load(path)?),
        None => Arc::new(OpenMeteoSource::from_config(&config.weather)),
    };

    let store: Arc<dyn KeyValueStore> = if args.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        open_store(&config)?
    };

    let service = WidgetService::new(
        &config,
        Arc::new(calendar),
        Arc::new(location),
        weather,
        store,
        clock,
    )?;

    let timeline = if args.placeholder {
        service.placeholder(args.kind, now)
    } else {
        service.build_timeline(args.kind, now).await
    };
    info!("Next refresh: {:?}", timeline.next_refresh());

    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}
