//! Periodic, non-overlapping background triggers
//!
//! Each trigger owns one loop. A tick that fires while the previous run of the
//! same trigger is still in flight is skipped, never queued.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observability::Metrics;

/// Work performed on every tick of one trigger
#[async_trait]
pub trait TickJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self);
}

/// Owns the trigger loops and their shared shutdown token
#[derive(Debug)]
pub struct RefreshScheduler {
    shutdown: CancellationToken,
    loops: Vec<(&'static str, JoinHandle<()>)>,
    metrics: Arc<Metrics>,
}

impl RefreshScheduler {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            shutdown: CancellationToken::new(),
            loops: Vec::new(),
            metrics,
        }
    }

    /// Names of the triggers currently scheduled
    pub fn triggers(&self) -> Vec<&'static str> {
        self.loops.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.loops.is_empty()
    }

    /// Start a trigger; the first tick fires immediately
    pub fn schedule(&mut self, every: Duration, job: Arc<dyn TickJob>) {
        let name = job.name();
        let shutdown = self.shutdown.child_token();
        let metrics = Arc::clone(&self.metrics);

        info!(trigger = name, interval_ms = every.as_millis() as u64, "Trigger scheduled");

        let handle = tokio::spawn(run_loop(every, job, shutdown, metrics));
        self.loops.push((name, handle));
    }

    /// Cancel every trigger and wait for the loops to exit
    pub async fn stop(&mut self) {
        self.shutdown.cancel();

        for (name, handle) in self.loops.drain(..) {
            if let Err(e) = handle.await {
                warn!(trigger = name, error = %e, "Trigger loop ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_loop(
    every: Duration,
    job: Arc<dyn TickJob>,
    shutdown: CancellationToken,
    metrics: Arc<Metrics>,
) {
    let name = job.name();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut running: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if running.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(trigger = name, "Previous run still in flight, tick skipped");
            metrics.tick_skipped();
            continue;
        }

        let job = Arc::clone(&job);
        running = Some(tokio::spawn(async move {
            let started = Instant::now();
            job.run().await;
            debug!(
                trigger = job.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Tick completed"
            );
        }));
    }

    if let Some(handle) = running {
        handle.abort();
    }
    debug!(trigger = name, "Trigger loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct SlowJob {
        active: AtomicUsize,
        max_active: AtomicUsize,
        runs: AtomicUsize,
        work: Duration,
    }

    #[async_trait]
    impl TickJob for SlowJob {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn run(&self) {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ticks_never_overlap() {
        let metrics = Arc::new(Metrics::new());
        let job = Arc::new(SlowJob {
            work: Duration::from_millis(60),
            ..SlowJob::default()
        });

        let mut scheduler = RefreshScheduler::new(metrics.clone());
        scheduler.schedule(Duration::from_millis(10), job.clone());
        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.stop().await;

        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        assert!(metrics.snapshot().ticks_skipped > 0);
    }

    #[tokio::test]
    async fn test_independent_triggers_run_concurrently() {
        struct Named(&'static str, Arc<AtomicUsize>);

        #[async_trait]
        impl TickJob for Named {
            fn name(&self) -> &'static str {
                self.0
            }

            async fn run(&self) {
                self.1.fetch_add(1, Ordering::SeqCst);
                // Never finishes within the test window
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        }

        let probe_runs = Arc::new(AtomicUsize::new(0));
        let refresh_runs = Arc::new(AtomicUsize::new(0));

        let mut scheduler = RefreshScheduler::new(Arc::new(Metrics::new()));
        scheduler.schedule(Duration::from_millis(10), Arc::new(Named("probe", probe_runs.clone())));
        scheduler.schedule(Duration::from_millis(10), Arc::new(Named("refresh", refresh_runs.clone())));
        assert_eq!(scheduler.triggers(), vec!["probe", "refresh"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_running());
        scheduler.stop().await;

        // A stuck probe does not starve the refresh trigger, and neither queues
        assert_eq!(probe_runs.load(Ordering::SeqCst), 1);
        assert_eq!(refresh_runs.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_prompt() {
        let job = Arc::new(SlowJob {
            work: Duration::from_secs(30),
            ..SlowJob::default()
        });

        let mut scheduler = RefreshScheduler::new(Arc::new(Metrics::new()));
        scheduler.schedule(Duration::from_secs(3600), job.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), scheduler.stop())
            .await
            .expect("stop should not wait for in-flight work");
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }
}
