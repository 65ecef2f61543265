//! Passive network reachability monitor
//!
//! Publishes reachability of the catalog host plus the active interface kind.
//! Nothing here gates fetches; outages surface as ordinary transport errors.

mod interfaces;

pub use interfaces::{InterfaceKind, SYSFS_NET, classify};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub reachable: bool,
    pub interface: InterfaceKind,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    host: String,
    port: u16,
    connect_timeout: Duration,
    sysfs_root: PathBuf,
    status: watch::Sender<ConnectivityStatus>,
}

impl ConnectivityMonitor {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        let (status, _) = watch::channel(ConnectivityStatus::default());
        Self {
            host: host.into(),
            port,
            connect_timeout,
            sysfs_root: PathBuf::from(SYSFS_NET),
            status,
        }
    }

    /// Monitor the host (and scheme default port) a URL points at
    pub fn for_url(url: &Url, connect_timeout: Duration) -> Result<Self, ConnectivityError> {
        let host = url
            .host_str()
            .ok_or_else(|| ConnectivityError::MissingHost(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);
        Ok(Self::new(host, port, connect_timeout))
    }

    /// Read interfaces from a different sysfs root
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.subscribe()
    }

    /// Run one reachability check and publish the result.
    ///
    /// Subscribers are only woken when reachability or interface kind changes.
    pub async fn check(&self) -> ConnectivityStatus {
        let reachable = self.reachable().await;

        let root = self.sysfs_root.clone();
        let interface = tokio::task::spawn_blocking(move || classify(&root))
            .await
            .unwrap_or_default();

        let now = Utc::now();
        self.status.send_if_modified(|status| {
            let changed = status.reachable != reachable || status.interface != interface;
            if changed {
                info!(
                    host = %self.host,
                    reachable,
                    interface = %interface,
                    "Connectivity changed"
                );
            }
            status.reachable = reachable;
            status.interface = interface;
            status.checked_at = Some(now);
            changed
        });

        self.status()
    }

    async fn reachable(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(host = %self.host, port = self.port, error = %e, "Host unreachable");
                false
            }
            Err(_) => {
                debug!(host = %self.host, port = self.port, "Reachability check timed out");
                false
            }
        }
    }
}
