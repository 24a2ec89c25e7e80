//! Location lookup for widgets.
//!
//! Widgets run in short-lived processes and cannot prompt for permission, so
//! location is resolved through three tiers: the fix the OS already holds,
//! the fix persisted in the shared store, and finally one fresh request.
//! See [`LocationCache`] for the coalescing rules.

mod cache;

pub use cache::{LocationCache, LocationPolicy, LocationResult};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StoreError, WidgetError};
use crate::sources::KeyValueStore;

/// Name used in errors and logs for the location collaborator.
pub const LOCATION_SOURCE: &str = "location";

/// Store key of the persisted fallback fix.
pub const LAST_KNOWN_LOCATION_KEY: &str = "lastKnownLocation";

/// A position fix and the moment it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
}

impl CachedLocation {
    pub fn new(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// Whether the fix is younger than `threshold` at `now`.
    pub fn is_within(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) < threshold
    }

    /// "12.35, -45.68"
    pub fn coordinate_string(&self) -> String {
        format!("{:.2}, {:.2}", self.latitude, self.longitude)
    }
}

/// Read the persisted fallback fix.
///
/// # Errors
/// Returns an error if the store fails or holds undecodable bytes.
pub fn load_persisted(store: &dyn KeyValueStore) -> Result<Option<CachedLocation>, StoreError> {
    let Some(bytes) = store.get(LAST_KNOWN_LOCATION_KEY)? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            key: LAST_KNOWN_LOCATION_KEY.to_string(),
            message: e.to_string(),
        })
}

/// Overwrite the persisted fallback fix.
///
/// # Errors
/// Returns an error if the store rejects the write.
pub fn persist(store: &dyn KeyValueStore, location: &CachedLocation) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(location).map_err(|e| StoreError::Corrupt {
        key: LAST_KNOWN_LOCATION_KEY.to_string(),
        message: e.to_string(),
    })?;
    store.set(LAST_KNOWN_LOCATION_KEY, &bytes)
}

/// The persisted fix alone, regardless of age.
///
/// # Errors
/// Returns [`WidgetError::NoCachedFallback`] when nothing readable is stored.
pub fn persisted_location(store: &dyn KeyValueStore) -> Result<CachedLocation, WidgetError> {
    match load_persisted(store) {
        Ok(Some(location)) => Ok(location),
        Ok(None) => Err(WidgetError::NoCachedFallback {
            source_name: LOCATION_SOURCE.to_string(),
        }),
        Err(e) => {
            warn!("Failed to read persisted location: {e}");
            Err(WidgetError::NoCachedFallback {
                source_name: LOCATION_SOURCE.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn age_and_threshold() {
        let fix = CachedLocation::new(52.52, 13.405, utc("2026-01-13T09:00:00Z"));
        let now = utc("2026-01-13T09:25:00Z");
        assert_eq!(fix.age(now), Duration::minutes(25));
        assert!(fix.is_within(now, Duration::minutes(30)));
        assert!(!fix.is_within(now, Duration::minutes(25)));
    }

    #[test]
    fn coordinate_string_rounds_to_two_places() {
        let fix = CachedLocation::new(12.3456, -45.678, utc("2026-01-13T09:00:00Z"));
        assert_eq!(fix.coordinate_string(), "12.35, -45.68");
    }

    #[test]
    fn persisted_roundtrip_uses_timestamp_field() {
        let store = MemoryStore::new();
        assert!(matches!(
            persisted_location(&store),
            Err(WidgetError::NoCachedFallback { .. })
        ));

        let fix = CachedLocation::new(1.0, 2.0, utc("2026-01-13T09:00:00Z"));
        persist(&store, &fix).unwrap();
        assert_eq!(persisted_location(&store).unwrap(), fix);

        let raw = store.get(LAST_KNOWN_LOCATION_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let store = MemoryStore::new();
        store.set(LAST_KNOWN_LOCATION_KEY, b"not json").unwrap();
        assert!(matches!(
            load_persisted(&store),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
