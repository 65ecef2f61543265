use super::models::Config;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Catalog base URL '{url}' is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Collection '{collection}' does not resolve to an http(s) URL: {location}")]
    InvalidCollectionUrl { collection: String, location: String },

    #[error("No catalog collections configured")]
    NoCollectionsConfigured,

    #[error("Interval must be positive: {field}")]
    ZeroInterval { field: &'static str },

    #[error("Version header names must not be empty")]
    EmptyVersionHeader,

    #[error("Metrics endpoint '{0}' is not a valid URL")]
    InvalidMetricsEndpoint(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_catalog(config)?;
    validate_schedule(config)?;
    validate_telemetry(config)?;
    Ok(())
}

/// Parse the base URL, ensuring it can act as a join base
pub(super) fn parse_base_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ValidationError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "expected an http(s) URL".to_string(),
        });
    }

    Ok(url)
}

/// Resolve a collection location against the base URL
pub(super) fn resolve_collection(
    base: &Url,
    name: &str,
    location: &str,
) -> Result<Url, ValidationError> {
    let invalid = || ValidationError::InvalidCollectionUrl {
        collection: name.to_string(),
        location: location.to_string(),
    };

    let resolved = base.join(location).map_err(|_| invalid())?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(resolved)
}

fn validate_catalog(config: &Config) -> Result<(), ValidationError> {
    let base = parse_base_url(&config.catalog.base_url)?;

    if config.catalog.collections.is_empty() {
        return Err(ValidationError::NoCollectionsConfigured);
    }

    for (name, location) in &config.catalog.collections {
        resolve_collection(&base, name, location)?;
    }

    if config
        .catalog
        .version_headers
        .iter()
        .any(|header| header.trim().is_empty())
    {
        return Err(ValidationError::EmptyVersionHeader);
    }

    Ok(())
}

fn validate_schedule(config: &Config) -> Result<(), ValidationError> {
    let schedule = &config.schedule;
    let intervals = [
        ("schedule.version_probe_interval", schedule.version_probe_interval),
        ("schedule.full_refresh_interval", schedule.full_refresh_interval),
        ("schedule.sweep_interval", schedule.sweep_interval),
        ("schedule.connectivity_interval", schedule.connectivity_interval),
        ("network.timeout", config.network.timeout),
    ];

    for (field, value) in intervals {
        if value.is_zero() {
            return Err(ValidationError::ZeroInterval { field });
        }
    }

    Ok(())
}

fn validate_telemetry(config: &Config) -> Result<(), ValidationError> {
    if let Some(endpoint) = &config.telemetry.metrics_endpoint {
        Url::parse(endpoint)
            .map_err(|_| ValidationError::InvalidMetricsEndpoint(endpoint.clone()))?;
    }
    Ok(())
}
