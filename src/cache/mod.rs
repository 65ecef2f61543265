//! Media cache: the single authority over decoded-media state
//!
//! All mutations go through one lock and every mutation publishes a fresh
//! [`CacheSnapshot`] on a `watch` channel while still holding it, so readers
//! only ever observe whole states.
//!
//! Fetches run as one task per identity, grouped into a [`RefreshBatch`].
//! An identity never has more than one fetch outstanding, even across an
//! eviction: an identity that returns while its old fetch is still running
//! takes that fetch over. The ticket issued when a fetch starts must still
//! match when the result comes back, or the result is discarded.

mod clock;
mod decode;
mod source;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decode::{DecodedImage, decode};
pub use source::ImageSource;
pub use state::{CacheSnapshot, CachedImage};

use chrono::TimeDelta;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::catalog::MediaDescriptor;
use crate::observability::Metrics;
use crate::transport::{FetchError, FetchMode};
use state::CacheState;

/// Cache tuning
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub fade_out_grace: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            fade_out_grace: Duration::from_secs(3),
        }
    }
}

impl From<&crate::config::CacheConfig> for CacheOptions {
    fn from(value: &crate::config::CacheConfig) -> Self {
        Self {
            fade_out_grace: value.fade_out_grace.as_duration(),
        }
    }
}

/// Tally of one finished batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Handle to a group of fetches started together.
///
/// Dropping it does not cancel anything; `last_refreshed` is updated once
/// the last fetch of the batch completes.
#[derive(Debug)]
pub struct RefreshBatch {
    size: usize,
    handle: JoinHandle<BatchOutcome>,
}

impl RefreshBatch {
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub async fn wait(self) -> BatchOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Refresh batch task aborted");
                BatchOutcome::default()
            }
        }
    }
}

struct FetchJob {
    identity: String,
    ticket: u64,
}

struct Inner {
    source: Arc<dyn ImageSource>,
    clock: Arc<dyn Clock>,
    grace: TimeDelta,
    metrics: Arc<Metrics>,
    state: Mutex<CacheState>,
    published: watch::Sender<Arc<CacheSnapshot>>,
}

/// Cloneable handle to the shared cache
#[derive(Clone)]
pub struct MediaCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MediaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("MediaCache")
            .field("tracked", &snapshot.catalog.len())
            .field("loaded", &snapshot.loaded.len())
            .field("loading", &snapshot.loading.len())
            .field("fading_out", &snapshot.fading_out.len())
            .finish()
    }
}

impl MediaCache {
    pub fn new(
        source: Arc<dyn ImageSource>,
        clock: Arc<dyn Clock>,
        options: CacheOptions,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (published, _) = watch::channel(Arc::new(CacheSnapshot::default()));
        let grace = TimeDelta::from_std(options.fade_out_grace).unwrap_or(TimeDelta::MAX);

        Self {
            inner: Arc::new(Inner {
                source,
                clock,
                grace,
                metrics,
                state: Mutex::new(CacheState::default()),
                published,
            }),
        }
    }

    /// Latest published state
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.inner.published.borrow().clone()
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<Arc<CacheSnapshot>> {
        self.inner.published.subscribe()
    }

    /// Replace the tracked identity set and fetch images not yet loaded.
    ///
    /// Descriptors whose URL does not parse are dropped. Identities no longer
    /// listed start fading out instead of disappearing. An empty (or
    /// entirely invalid) list leaves the tracked set untouched and only
    /// advances `last_refreshed`.
    pub async fn preload(&self, descriptors: Vec<MediaDescriptor>) -> RefreshBatch {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let now = self.inner.clock.now();
        self.inner.evict_expired(state, now);

        let submitted = descriptors.len();
        let mut seen = HashSet::new();
        let catalog: Vec<MediaDescriptor> = descriptors
            .into_iter()
            .filter(|descriptor| descriptor.parsed_url().is_some())
            .filter(|descriptor| seen.insert(descriptor.url.clone()))
            .collect();

        if catalog.len() < submitted {
            debug!(
                dropped = submitted - catalog.len(),
                "Dropped invalid or duplicate descriptors"
            );
        }

        if catalog.is_empty() {
            drop(guard);
            return self.inner.spawn_batch(Vec::new(), FetchMode::Cached);
        }

        let mut faded = 0usize;
        for (identity, entry) in state.entries.iter_mut() {
            if !seen.contains(identity) && !entry.is_fading() {
                entry.fading_since = Some(now);
                faded += 1;
            }
        }

        let mut jobs = Vec::new();
        for descriptor in &catalog {
            let ticket = state.next_ticket + 1;
            let entry = state.track(descriptor);

            if entry.fading_since.take().is_some() {
                debug!(url = %descriptor.url, "Identity reappeared before eviction");
            }
            entry.descriptor = descriptor.clone();

            if entry.wants_fetch() && entry.content.is_none() {
                entry.in_flight = Some(ticket);
                state.next_ticket = ticket;
                jobs.push(FetchJob {
                    identity: descriptor.url.clone(),
                    ticket,
                });
            }
        }

        info!(
            tracked = catalog.len(),
            fetching = jobs.len(),
            fading = faded,
            "Catalog preloaded"
        );

        state.catalog = catalog;
        self.inner.publish(state);
        drop(guard);

        self.inner.spawn_batch(jobs, FetchMode::Cached)
    }

    /// Re-fetch every tracked image, bypassing transport caches.
    ///
    /// Already-loaded images stay visible while their re-fetch runs. Most
    /// recently accessed identities are issued first.
    pub async fn refresh(&self) -> RefreshBatch {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        self.inner.evict_expired(&mut state, now);

        let mut candidates: Vec<(usize, Option<chrono::DateTime<chrono::Utc>>, String)> = state
            .catalog
            .iter()
            .enumerate()
            .filter_map(|(position, descriptor)| {
                let entry = state.entries.get(&descriptor.url)?;
                entry
                    .wants_fetch()
                    .then(|| (position, entry.last_access, descriptor.url.clone()))
            })
            .collect();

        // Recently accessed first, then catalog order
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut jobs = Vec::with_capacity(candidates.len());
        for (_, _, identity) in candidates {
            let ticket = state.issue_ticket();
            if let Some(entry) = state.entries.get_mut(&identity) {
                entry.in_flight = Some(ticket);
                jobs.push(FetchJob { identity, ticket });
            }
        }

        debug!(fetching = jobs.len(), "Full refresh issued");

        self.inner.publish(&mut state);
        drop(state);

        self.inner.spawn_batch(jobs, FetchMode::BypassCache)
    }

    /// Explicit retry of a failed identity, bypassing transport caches.
    ///
    /// Returns `None` when the identity is unknown, not an image, fading,
    /// already loaded or already loading.
    pub async fn retry_image(&self, identity: &str) -> Option<RefreshBatch> {
        self.request_single(identity, FetchMode::BypassCache).await
    }

    /// Fetch an identity that has never been loaded (e.g. scrolled into view)
    pub async fn load_image_immediately(&self, identity: &str) -> Option<RefreshBatch> {
        self.request_single(identity, FetchMode::Cached).await
    }

    async fn request_single(&self, identity: &str, mode: FetchMode) -> Option<RefreshBatch> {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        self.inner.evict_expired(&mut state, now);

        let eligible = state
            .entries
            .get(identity)
            .is_some_and(|entry| entry.wants_fetch() && entry.content.is_none());
        if !eligible {
            debug!(url = %identity, "Single fetch request ignored");
            return None;
        }

        let ticket = state.issue_ticket();
        if let Some(entry) = state.entries.get_mut(identity) {
            entry.in_flight = Some(ticket);
        }
        self.inner.publish(&mut state);
        drop(state);

        let job = FetchJob {
            identity: identity.to_string(),
            ticket,
        };
        Some(self.inner.spawn_batch(vec![job], mode))
    }

    /// Note that a consumer displayed `identity`; orders future refreshes
    pub async fn record_access(&self, identity: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        match state.entries.get_mut(identity) {
            Some(entry) => {
                entry.last_access = Some(now);
                true
            }
            None => false,
        }
    }

    /// Evict identities whose fade-out window has elapsed
    pub async fn sweep(&self) -> usize {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        self.inner.evict_expired(&mut state, now)
    }

    /// Publish (or clear) the catalog-level error
    pub async fn set_last_error(&self, error: Option<FetchError>) {
        let mut state = self.inner.state.lock().await;
        if state.last_error != error {
            state.last_error = error;
            self.inner.publish(&mut state);
        }
    }

    /// Most recent per-identity failure, if the identity has one
    pub async fn failure(&self, identity: &str) -> Option<FetchError> {
        let state = self.inner.state.lock().await;
        state
            .entries
            .get(identity)
            .and_then(|entry| entry.last_failure.clone())
    }
}

impl Inner {
    fn publish(&self, state: &mut CacheState) {
        let snapshot = state.snapshot();
        self.published.send_replace(Arc::new(snapshot));
    }

    /// Evicts expired entries, publishing when anything changed
    fn evict_expired(&self, state: &mut CacheState, now: chrono::DateTime<chrono::Utc>) -> usize {
        let evicted = state.evict_expired(now, self.grace);
        if !evicted.is_empty() {
            for identity in &evicted {
                debug!(url = %identity, "Evicted after fade-out");
                self.metrics.eviction();
            }
            self.publish(state);
        }
        evicted.len()
    }

    fn spawn_batch(self: &Arc<Self>, jobs: Vec<FetchJob>, mode: FetchMode) -> RefreshBatch {
        let size = jobs.len();
        let inner = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut set = JoinSet::new();
            for job in jobs {
                let inner = Arc::clone(&inner);
                set.spawn(async move { inner.run_fetch(job, mode).await });
            }

            let mut outcome = BatchOutcome::default();
            while let Some(result) = set.join_next().await {
                match result {
                    Ok(true) => outcome.succeeded += 1,
                    Ok(false) => outcome.failed += 1,
                    Err(e) => {
                        warn!(error = %e, "Fetch task failed to complete");
                        outcome.failed += 1;
                    }
                }
            }

            let mut state = inner.state.lock().await;
            let now = inner.clock.now();
            state.mark_refreshed(now);
            inner.publish(&mut state);

            outcome
        });

        RefreshBatch { size, handle }
    }

    /// Fetch, decode and commit one identity; `true` on success
    async fn run_fetch(&self, job: FetchJob, mode: FetchMode) -> bool {
        self.metrics.image_fetch();

        let result = match self.source.fetch(&job.identity, mode).await {
            Ok(bytes) => decode(bytes).await,
            Err(e) => Err(e),
        };
        let success = result.is_ok();
        if !success {
            self.metrics.image_failure();
        }

        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let Some(entry) = state.entries.get_mut(&job.identity) else {
            if state.orphaned.get(&job.identity) == Some(&job.ticket) {
                state.orphaned.remove(&job.identity);
            }
            debug!(url = %job.identity, "Result for evicted identity discarded");
            return success;
        };
        if entry.in_flight != Some(job.ticket) {
            debug!(url = %job.identity, "Superseded fetch result discarded");
            return success;
        }

        entry.in_flight = None;
        match result {
            Ok(image) if !entry.is_fading() => {
                debug!(
                    url = %job.identity,
                    width = image.width,
                    height = image.height,
                    "Image loaded"
                );
                entry.content = Some(CachedImage {
                    image: Arc::new(image),
                    loaded_at: now,
                });
                entry.last_failure = None;
            }
            Ok(_) => {
                debug!(url = %job.identity, "Image fetched for fading identity, not surfaced");
            }
            Err(e) => {
                warn!(url = %job.identity, kind = e.kind(), error = %e, "Image fetch failed");
                entry.last_failure = Some(e);
            }
        }

        self.publish(&mut state);
        success
    }
}
