//! Observability: counters, metrics push and tracing setup

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::transport::{HttpClient, Result};

pub const DEFAULT_LOG_FILTER: &str = "camfeed=info";

/// Install the global `fmt` subscriber, honouring `RUST_LOG` when set
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second init (tests, embedding) is not an error worth surfacing
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    catalog_syncs: AtomicU64,
    catalog_failures: AtomicU64,
    probes_unchanged: AtomicU64,
    probe_failures: AtomicU64,
    image_fetches: AtomicU64,
    image_failures: AtomicU64,
    evictions: AtomicU64,
    full_refreshes: AtomicU64,
    ticks_skipped: AtomicU64,
}

macro_rules! counter {
    ($method:ident, $field:ident) => {
        pub fn $method(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            debug!(counter = stringify!($field), "Metric incremented");
        }
    };
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(catalog_sync, catalog_syncs);
    counter!(catalog_failure, catalog_failures);
    counter!(probe_unchanged, probes_unchanged);
    counter!(probe_failure, probe_failures);
    counter!(image_fetch, image_fetches);
    counter!(image_failure, image_failures);
    counter!(eviction, evictions);
    counter!(full_refresh, full_refreshes);
    counter!(tick_skipped, ticks_skipped);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            catalog_syncs: self.catalog_syncs.load(Ordering::Relaxed),
            catalog_failures: self.catalog_failures.load(Ordering::Relaxed),
            probes_unchanged: self.probes_unchanged.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            image_fetches: self.image_fetches.load(Ordering::Relaxed),
            image_failures: self.image_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            full_refreshes: self.full_refreshes.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub catalog_syncs: u64,
    pub catalog_failures: u64,
    pub probes_unchanged: u64,
    pub probe_failures: u64,
    pub image_fetches: u64,
    pub image_failures: u64,
    pub evictions: u64,
    pub full_refreshes: u64,
    pub ticks_skipped: u64,
}

/// Posts counter snapshots to an external collector
#[derive(Debug, Clone)]
pub struct MetricsReporter {
    client: HttpClient,
    endpoint: Url,
}

impl MetricsReporter {
    pub fn new(client: HttpClient, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn push(&self, metrics: &Metrics) -> Result<()> {
        let snapshot = metrics.snapshot();
        self.client.post_json(&self.endpoint, &snapshot).await?;
        debug!(endpoint = %self.endpoint, "Metrics pushed");
        Ok(())
    }
}
