use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use widgetline_core::{Config, SharedSettings};

use super::{open_store, CommandResult};

#[derive(Subcommand)]
pub enum LocationAction {
    /// Show the location the widgets last persisted
    Show,
}

pub fn run(action: LocationAction) -> CommandResult {
    let config = Config::load()?;
    let settings = SharedSettings::new(open_store(&config)?);

    match action {
        LocationAction::Show => match settings.last_known_location()? {
            Some(location) => {
                let age = location.age(Utc::now());
                let out = json!({
                    "latitude": location.latitude,
                    "longitude": location.longitude,
                    "timestamp": location.captured_at,
                    "coordinates": location.coordinate_string(),
                    "age_minutes": age.num_minutes(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            None => println!("no cached location"),
        },
    }
    Ok(())
}
