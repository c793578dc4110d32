//! Wardrobe - Appearance Designs for Live Entities
//!
//! Wardrobe stores appearance designs, merges them field by field into the
//! tracked state of live entities, guards those entities with advisory key
//! locks and shares designs as compact versioned text blobs.
#![warn(missing_docs)]

// Core foundational modules
pub mod core;

// Main functional modules
pub mod api;
pub mod system;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Error, Result};
pub use api::{ApplyFlags, DesignSource, ResultCode, Wardrobe};
pub use wardrobe_core;

use crate::core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = match config.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Initialize logging and metrics
pub fn init(config: &Config) -> Result<()> {
    init_logging(&config.logging);
    tracing::info!("Initializing {} v{}", NAME, VERSION);

    if config.metrics.enabled {
        system::metrics::init_registry();
    }

    Ok(())
}
