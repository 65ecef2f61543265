//! Feed service: wires catalog, probe, cache, connectivity and scheduler
//!
//! Constructed explicitly from [`Config`] and handed to consumers; nothing is
//! global. `start()` launches the background triggers, `stop()` cancels them.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheOptions, CacheSnapshot, Clock, MediaCache, RefreshBatch, SystemClock};
use crate::catalog::{CatalogFetcher, MediaDescriptor};
use crate::config::{Config, ConfigError, ScheduleConfig};
use crate::connectivity::{ConnectivityError, ConnectivityMonitor, ConnectivityStatus};
use crate::observability::{Metrics, MetricsReporter, MetricsSnapshot};
use crate::probe::{ProbeOutcome, VersionProbe, VersionToken};
use crate::scheduler::{RefreshScheduler, TickJob};
use crate::transport::{FetchError, HttpClient, HttpConfig};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client setup failed: {0}")]
    Transport(#[from] FetchError),

    #[error("connectivity monitor setup failed: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("invalid metrics endpoint {url}: {reason}")]
    MetricsEndpoint { url: String, reason: String },

    #[error("service is already running")]
    AlreadyRunning,
}

/// Result of one catalog synchronization cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Version token matched the committed one; catalog not fetched
    Unchanged,
    /// Probe failed; treated as no change for this cycle
    ProbeFailed(FetchError),
    /// Catalog fetched and preloaded
    Synced {
        tracked: usize,
        fetched: usize,
        failed: usize,
    },
    /// Catalog fetch failed; the token stays uncommitted so the next cycle retries
    CatalogFailed(FetchError),
}

struct ServiceInner {
    schedule: ScheduleConfig,
    fetcher: CatalogFetcher,
    probe: VersionProbe,
    cache: MediaCache,
    connectivity: ConnectivityMonitor,
    metrics: Arc<Metrics>,
    reporter: Option<MetricsReporter>,
}

pub struct FeedService {
    inner: Arc<ServiceInner>,
    scheduler: Mutex<Option<RefreshScheduler>>,
}

impl std::fmt::Debug for FeedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedService")
            .field("cache", &self.inner.cache)
            .field("collections", &self.inner.fetcher.collections().len())
            .finish_non_exhaustive()
    }
}

impl FeedService {
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build with an injected clock (simulated time in tests)
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        let client = HttpClient::new(HttpConfig::from(&config.network))?;
        let base_url = config.base_url()?;
        let metrics = Arc::new(Metrics::new());

        let fetcher = CatalogFetcher::new(client.clone(), config.collection_endpoints()?);
        let probe = VersionProbe::new(
            client.clone(),
            base_url.clone(),
            config.catalog.version_headers.clone(),
        );
        let cache = MediaCache::new(
            Arc::new(client.clone()),
            clock,
            CacheOptions::from(&config.cache),
            Arc::clone(&metrics),
        );
        let connectivity =
            ConnectivityMonitor::for_url(&base_url, config.network.timeout.as_duration())?;

        let reporter = config
            .telemetry
            .metrics_endpoint
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map(|endpoint| MetricsReporter::new(client.clone(), endpoint))
                    .map_err(|e| ServiceError::MetricsEndpoint {
                        url: raw.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        info!(
            base_url = %base_url,
            collections = fetcher.collections().len(),
            metrics_push = reporter.is_some(),
            "Feed service configured"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                schedule: config.schedule.clone(),
                fetcher,
                probe,
                cache,
                connectivity,
                metrics,
                reporter,
            }),
            scheduler: Mutex::new(None),
        })
    }

    /// Launch the background triggers
    pub async fn start(&self) -> Result<(), ServiceError> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }

        let schedule = &self.inner.schedule;
        let mut scheduler = RefreshScheduler::new(Arc::clone(&self.inner.metrics));
        scheduler.schedule(
            schedule.version_probe_interval.as_duration(),
            Arc::new(CatalogSyncJob(Arc::clone(&self.inner))),
        );
        scheduler.schedule(
            schedule.full_refresh_interval.as_duration(),
            Arc::new(FullRefreshJob(Arc::clone(&self.inner))),
        );
        scheduler.schedule(
            schedule.sweep_interval.as_duration(),
            Arc::new(SweepJob(Arc::clone(&self.inner))),
        );
        scheduler.schedule(
            schedule.connectivity_interval.as_duration(),
            Arc::new(ConnectivityJob(Arc::clone(&self.inner))),
        );

        *slot = Some(scheduler);
        info!("Feed service started");
        Ok(())
    }

    /// Cancel the background triggers; safe to call when not running
    pub async fn stop(&self) {
        let scheduler = self.scheduler.lock().await.take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop().await;
            info!("Feed service stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// Probe for a catalog change and, if there is one, fetch and preload it
    pub async fn sync_catalog(&self) -> SyncOutcome {
        self.inner.sync_catalog().await
    }

    /// Re-fetch every tracked image, bypassing transport caches
    pub async fn request_refresh(&self) -> RefreshBatch {
        self.inner.cache.refresh().await
    }

    /// Retry a failed identity, or load one never fetched
    pub async fn request_image(&self, identity: &str) -> Option<RefreshBatch> {
        let cache = &self.inner.cache;
        if cache.failure(identity).await.is_some() {
            cache.retry_image(identity).await
        } else {
            cache.load_image_immediately(identity).await
        }
    }

    /// Preload a catalog supplied directly by the consumer
    pub async fn supply_catalog(&self, descriptors: Vec<MediaDescriptor>) -> RefreshBatch {
        self.inner.cache.preload(descriptors).await
    }

    pub async fn record_access(&self, identity: &str) -> bool {
        self.inner.cache.record_access(identity).await
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheSnapshot>> {
        self.inner.cache.subscribe()
    }

    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.inner.cache.snapshot()
    }

    pub fn cache(&self) -> &MediaCache {
        &self.inner.cache
    }

    pub fn fetcher(&self) -> &CatalogFetcher {
        &self.inner.fetcher
    }

    /// Current version token of the catalog, without comparing or committing
    pub async fn probe_version(&self) -> Result<VersionToken, FetchError> {
        self.inner.probe.probe().await
    }

    pub fn connectivity(&self) -> ConnectivityStatus {
        self.inner.connectivity.status()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<ConnectivityStatus> {
        self.inner.connectivity.subscribe()
    }

    pub async fn check_connectivity(&self) -> ConnectivityStatus {
        self.inner.connectivity.check().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Full refresh cycle as run by the scheduler, waiting for its fetches
    pub async fn run_full_refresh(&self) {
        self.inner.full_refresh().await
    }
}

impl ServiceInner {
    async fn sync_catalog(&self) -> SyncOutcome {
        let token = match self.probe.check().await {
            Ok(ProbeOutcome::Changed(token)) => token,
            Ok(ProbeOutcome::Unchanged) => {
                debug!("Catalog version unchanged");
                self.metrics.probe_unchanged();
                self.cache.set_last_error(None).await;
                return SyncOutcome::Unchanged;
            }
            Err(e) => {
                self.metrics.probe_failure();
                self.cache.set_last_error(Some(e.clone())).await;
                return SyncOutcome::ProbeFailed(e);
            }
        };

        let descriptors = match self.fetcher.fetch_all().await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                self.metrics.catalog_failure();
                self.cache.set_last_error(Some(e.clone())).await;
                return SyncOutcome::CatalogFailed(e);
            }
        };

        let tracked = descriptors.len();
        let batch = self.cache.preload(descriptors).await;
        self.probe.commit(token).await;
        self.metrics.catalog_sync();
        self.cache.set_last_error(None).await;

        let outcome = batch.wait().await;
        SyncOutcome::Synced {
            tracked,
            fetched: outcome.succeeded,
            failed: outcome.failed,
        }
    }

    async fn full_refresh(&self) {
        self.metrics.full_refresh();
        let outcome = self.cache.refresh().await.wait().await;
        if outcome.failed > 0 {
            debug!(
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                "Full refresh finished with failures"
            );
        }

        if let Some(reporter) = &self.reporter {
            if let Err(e) = reporter.push(&self.metrics).await {
                warn!(endpoint = %reporter.endpoint(), error = %e, "Metrics push failed");
            }
        }
    }
}

struct CatalogSyncJob(Arc<ServiceInner>);

#[async_trait]
impl TickJob for CatalogSyncJob {
    fn name(&self) -> &'static str {
        "catalog_sync"
    }

    async fn run(&self) {
        self.0.sync_catalog().await;
    }
}

struct FullRefreshJob(Arc<ServiceInner>);

#[async_trait]
impl TickJob for FullRefreshJob {
    fn name(&self) -> &'static str {
        "full_refresh"
    }

    async fn run(&self) {
        self.0.full_refresh().await;
    }
}

struct SweepJob(Arc<ServiceInner>);

#[async_trait]
impl TickJob for SweepJob {
    fn name(&self) -> &'static str {
        "fade_out_sweep"
    }

    async fn run(&self) {
        self.0.cache.sweep().await;
    }
}

struct ConnectivityJob(Arc<ServiceInner>);

#[async_trait]
impl TickJob for ConnectivityJob {
    fn name(&self) -> &'static str {
        "connectivity"
    }

    async fn run(&self) {
        self.0.connectivity.check().await;
    }
}
