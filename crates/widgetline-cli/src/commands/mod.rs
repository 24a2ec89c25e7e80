pub mod config;
pub mod location;
pub mod settings;
pub mod timeline;

use std::sync::Arc;

use widgetline_core::{Config, KeyValueStore, SqliteStore};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the shared store under the configured namespace.
pub fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteStore::open(&config.store.namespace)?))
}
