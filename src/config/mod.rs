//! Configuration management for camfeed
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use camfeed::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Catalog base: {}", config.catalog.base_url);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `CAMFEED__<section>__<key>`
//!
//! Examples:
//! - `CAMFEED__CATALOG__BASE_URL=https://cams.example.com/api/`
//! - `CAMFEED__NETWORK__TIMEOUT=30s`
//! - `CAMFEED__SCHEDULE__FULL_REFRESH_INTERVAL=5s`
//! - `CAMFEED__SCHEDULE__VERSION_PROBE_INTERVAL=5s`
//! - `CAMFEED__TELEMETRY__METRICS_ENDPOINT=http://collector:9000/metrics`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/camfeed.toml`.
//! This can be overridden using the `CAMFEED_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    CacheConfig, CatalogConfig, Config, NetworkConfig, ScheduleConfig, ServerConfig,
    TelemetryConfig,
};
pub use validation::ValidationError;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

/// A named catalog collection resolved to its endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEndpoint {
    pub name: String,
    pub url: Url,
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`CAMFEED__*`)
    /// 2. TOML file (default: `config/camfeed.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (bad URLs, zero intervals, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Parsed catalog base URL (also the version probe target)
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Ok(validation::parse_base_url(&self.catalog.base_url)?)
    }

    /// Resolve every configured collection, in name order
    pub fn collection_endpoints(&self) -> Result<Vec<CollectionEndpoint>, ConfigError> {
        let base = self.base_url()?;

        self.catalog
            .collections
            .iter()
            .map(|(name, location)| -> Result<CollectionEndpoint, ConfigError> {
                let url = validation::resolve_collection(&base, name, location)?;
                Ok(CollectionEndpoint {
                    name: name.clone(),
                    url,
                })
            })
            .collect()
    }
}
