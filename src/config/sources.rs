use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CAMFEED_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/camfeed.toml";
const ENV_PREFIX: &str = "CAMFEED";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // CAMFEED__SCHEDULE__FULL_REFRESH_INTERVAL -> schedule.full_refresh_interval
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:8090");
        assert_eq!(config.network.timeout.as_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[catalog]
base_url = "https://cams.example.com/api/"

[catalog.collections]
harbour = "harbour"
summit = "https://other.example.com/summit.json"

[network]
timeout = "12s"

[schedule]
full_refresh_interval = 10
version_probe_interval = "750ms"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.catalog.base_url, "https://cams.example.com/api/");
        assert_eq!(config.catalog.collections.len(), 2);
        assert_eq!(config.network.timeout.as_duration(), Duration::from_secs(12));
        assert_eq!(
            config.schedule.full_refresh_interval.as_duration(),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.schedule.version_probe_interval.as_duration(),
            Duration::from_millis(750)
        );
        // Untouched sections keep their defaults
        assert_eq!(config.cache.fade_out_grace.as_duration(), Duration::from_secs(3));
    }

    // Environment overrides are not exercised here: mutating the process
    // environment from parallel tests is unsound under edition 2024.
}
