mod config;
mod store;

pub use config::{CalendarConfig, Config, EventsConfig, LocationConfig, StoreConfig, WeatherConfig};
pub use store::{MemoryStore, SqliteStore};

use std::path::PathBuf;

/// Returns `~/.config/widgetline[-dev]/` based on WIDGETLINE_ENV.
///
/// Set WIDGETLINE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WIDGETLINE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("widgetline-dev")
    } else {
        base_dir.join("widgetline")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
