//! Settings shared between the app and its widgets.
//!
//! Everything lives in the app-group [`KeyValueStore`], so a widget process
//! sees what the app wrote. Interested parts of the app register a callback
//! and are told about every change made through this handle.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, StoreError};
use crate::location::{load_persisted, CachedLocation};
use crate::sources::KeyValueStore;

pub const COLOR_SCHEME_KEY: &str = "widgetColorScheme";
pub const LAST_BACKGROUND_REFRESH_KEY: &str = "lastBackgroundRefreshDate";

/// How often the app asks for a background refresh.
pub const BACKGROUND_REFRESH_INTERVAL_SECS: i64 = 3600;

/// Appearance the widgets render with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetColorScheme {
    #[default]
    System,
    Light,
    Dark,
}

impl WidgetColorScheme {
    pub const ALL: [Self; 3] = [Self::System, Self::Light, Self::Dark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::System => "System Default",
            Self::Light => "Light Mode",
            Self::Dark => "Dark Mode",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::System => "Match device appearance",
            Self::Light => "Always light",
            Self::Dark => "Always dark",
        }
    }
}

impl fmt::Display for WidgetColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetColorScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(ConfigError::InvalidValue {
                key: COLOR_SCHEME_KEY.into(),
                message: format!("unknown color scheme '{other}' (expected system, light or dark)"),
            }),
        }
    }
}

/// What changed in a [`SharedSettings`] write.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsChange {
    ColorScheme(WidgetColorScheme),
    LastBackgroundRefresh(DateTime<Utc>),
}

/// Handle returned by [`SharedSettings::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn Fn(&SettingsChange) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Arc<Callback>)>,
}

pub struct SharedSettings {
    store: Arc<dyn KeyValueStore>,
    subscribers: Mutex<Subscribers>,
}

impl SharedSettings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            subscribers: Mutex::new(Subscribers::default()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SettingsChange) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.callbacks.push((id, Arc::new(Box::new(callback) as Callback)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let before = subs.callbacks.len();
        subs.callbacks.retain(|(sub, _)| *sub != id);
        subs.callbacks.len() != before
    }

    fn notify(&self, change: SettingsChange) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Arc<Callback>> = {
            let subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subs.callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        debug!("Notifying {} settings subscribers of {change:?}", callbacks.len());
        for callback in callbacks {
            callback(&change);
        }
    }

    /// Stored scheme, or `System` when unset or unreadable.
    pub fn color_scheme(&self) -> WidgetColorScheme {
        match self.store.get(COLOR_SCHEME_KEY) {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).parse().unwrap_or_else(|e| {
                warn!("Ignoring stored color scheme: {e}");
                WidgetColorScheme::default()
            }),
            Ok(None) => WidgetColorScheme::default(),
            Err(e) => {
                warn!("Failed to read color scheme: {e}");
                WidgetColorScheme::default()
            }
        }
    }

    pub fn set_color_scheme(&self, scheme: WidgetColorScheme) -> Result<(), StoreError> {
        self.store.set(COLOR_SCHEME_KEY, scheme.as_str().as_bytes())?;
        self.notify(SettingsChange::ColorScheme(scheme));
        Ok(())
    }

    pub fn last_background_refresh(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(bytes) = self.store.get(LAST_BACKGROUND_REFRESH_KEY)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        DateTime::parse_from_rfc3339(&text)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| StoreError::Corrupt {
                key: LAST_BACKGROUND_REFRESH_KEY.into(),
                message: e.to_string(),
            })
    }

    pub fn set_last_background_refresh(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.store
            .set(LAST_BACKGROUND_REFRESH_KEY, at.to_rfc3339().as_bytes())?;
        self.notify(SettingsChange::LastBackgroundRefresh(at));
        Ok(())
    }

    /// Whether a background refresh is due at `now`.
    pub fn background_refresh_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_background_refresh() {
            Ok(Some(last)) => now - last >= Duration::seconds(BACKGROUND_REFRESH_INTERVAL_SECS),
            Ok(None) => true,
            Err(e) => {
                warn!("Treating unreadable refresh time as due: {e}");
                true
            }
        }
    }

    /// Location the widgets last persisted.
    pub fn last_known_location(&self) -> Result<Option<CachedLocation>, StoreError> {
        load_persisted(self.store.as_ref())
    }
}
