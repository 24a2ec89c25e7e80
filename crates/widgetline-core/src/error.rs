//! Core error types for widgetline-core.
//!
//! `WidgetError` is the fetch-side taxonomy that timeline providers convert
//! into degraded snapshots. The remaining enums cover local storage and
//! configuration, and roll up into [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while gathering data for a timeline.
///
/// Cloneable so a single upstream result can be delivered to every caller
/// waiting on the same location request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// The user denied (or the device restricts) access to the data source.
    #[error("Permission denied for {source_name}")]
    PermissionDenied { source_name: String },

    /// Permission has not been requested yet. Widgets cannot prompt.
    #[error("Permission not yet determined for {source_name}")]
    PermissionUndetermined { source_name: String },

    /// The upstream request did not answer in time.
    #[error("{source_name} did not respond within {timeout_secs} seconds")]
    UpstreamTimeout { source_name: String, timeout_secs: u64 },

    /// The upstream request failed outright.
    #[error("{source_name} request failed: {message}")]
    UpstreamFailure { source_name: String, message: String },

    /// Nothing usable is cached for this source.
    #[error("No cached {source_name} available")]
    NoCachedFallback { source_name: String },
}

impl WidgetError {
    pub fn denied(source_name: &str) -> Self {
        Self::PermissionDenied {
            source_name: source_name.to_string(),
        }
    }

    pub fn undetermined(source_name: &str) -> Self {
        Self::PermissionUndetermined {
            source_name: source_name.to_string(),
        }
    }

    pub fn upstream(source_name: &str, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Name of the collaborator the failure came from.
    pub fn source_name(&self) -> &str {
        match self {
            Self::PermissionDenied { source_name }
            | Self::PermissionUndetermined { source_name }
            | Self::UpstreamTimeout { source_name, .. }
            | Self::UpstreamFailure { source_name, .. }
            | Self::NoCachedFallback { source_name } => source_name,
        }
    }

    /// Whether the failure is a permission state rather than a transient fault.
    pub fn is_permission(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::PermissionUndetermined { .. }
        )
    }
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// Stored bytes could not be decoded
    #[error("Corrupt value for key '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Core error type for widgetline-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Data-source errors
    #[error(transparent)]
    Widget(#[from] WidgetError),

    /// Store-related errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_error_reports_its_source() {
        let err = WidgetError::UpstreamTimeout {
            source_name: "location".into(),
            timeout_secs: 10,
        };
        assert_eq!(err.source_name(), "location");
        assert_eq!(
            err.to_string(),
            "location did not respond within 10 seconds"
        );
        assert!(!err.is_permission());
        assert!(WidgetError::denied("calendar").is_permission());
        assert!(WidgetError::undetermined("calendar").is_permission());
    }

    #[test]
    fn core_error_wraps_widget_error_transparently() {
        let err: CoreError = WidgetError::upstream("weather", "503").into();
        assert_eq!(err.to_string(), "weather request failed: 503");
    }
}
