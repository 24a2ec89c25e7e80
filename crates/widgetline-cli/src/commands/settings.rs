use clap::Subcommand;
use serde_json::json;
use tracing::info;
use widgetline_core::{Config, SharedSettings, WidgetColorScheme};

use super::{open_store, CommandResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show or change the widget color scheme
    Scheme {
        /// New scheme: system, light or dark
        value: Option<WidgetColorScheme>,
    },
    /// Print all shared settings as JSON
    Show,
}

pub fn run(action: SettingsAction) -> CommandResult {
    let config = Config::load()?;
    let settings = SharedSettings::new(open_store(&config)?);

    match action {
        SettingsAction::Scheme { value: Some(scheme) } => {
            settings.subscribe(|change| info!("Settings changed: {change:?}"));
            settings.set_color_scheme(scheme)?;
            println!("{} ({})", scheme, scheme.display_name());
        }
        SettingsAction::Scheme { value: None } => {
            let scheme = settings.color_scheme();
            println!("{} ({})", scheme, scheme.display_name());
        }
        SettingsAction::Show => {
            let scheme = settings.color_scheme();
            let out = json!({
                "color_scheme": scheme,
                "color_scheme_description": scheme.description(),
                "last_background_refresh": settings.last_background_refresh()?,
                "last_known_location": settings.last_known_location()?,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
