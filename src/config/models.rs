use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Remote catalog endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Collection name -> path relative to `base_url` (or an absolute URL)
    #[serde(default = "default_collections")]
    pub collections: BTreeMap<String, String>,
    /// Response headers consulted by the version probe, highest priority first.
    /// `ETag` and `Last-Modified` are always consulted after these.
    #[serde(default = "default_version_headers")]
    pub version_headers: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            collections: default_collections(),
            version_headers: default_version_headers(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/".to_string()
}

fn default_collections() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cameras".to_string(), "cameras.json".to_string()),
        ("gallery".to_string(), "images.json".to_string()),
    ])
}

fn default_version_headers() -> Vec<String> {
    vec!["X-Content-Version".to_string(), "X-Version".to_string()]
}

/// HTTP client settings shared by catalog, probe and image fetches
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("camfeed/{}", env!("CARGO_PKG_VERSION"))
}

/// Periodic trigger intervals
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_version_probe_interval")]
    pub version_probe_interval: HumanDuration,
    #[serde(default = "default_full_refresh_interval")]
    pub full_refresh_interval: HumanDuration,
    /// How often fade-out markers are swept for expiry
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: HumanDuration,
    #[serde(default = "default_connectivity_interval")]
    pub connectivity_interval: HumanDuration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            version_probe_interval: default_version_probe_interval(),
            full_refresh_interval: default_full_refresh_interval(),
            sweep_interval: default_sweep_interval(),
            connectivity_interval: default_connectivity_interval(),
        }
    }
}

fn default_version_probe_interval() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_full_refresh_interval() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_sweep_interval() -> HumanDuration {
    HumanDuration::from_secs(1)
}

fn default_connectivity_interval() -> HumanDuration {
    HumanDuration::from_secs(10)
}

/// Media cache tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Grace window an identity dropped from the catalog stays visible
    #[serde(default = "default_fade_out_grace")]
    pub fade_out_grace: HumanDuration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fade_out_grace: default_fade_out_grace(),
        }
    }
}

fn default_fade_out_grace() -> HumanDuration {
    HumanDuration::from_secs(3)
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8090))
}

/// Telemetry configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Endpoint receiving periodic metrics snapshots (JSON POST)
    pub metrics_endpoint: Option<String>,
}
