//! Status API models
//!
//! The API is the control surface a presentation layer drives:
//! - `GET /status` returns a [`StatusResponse`] summarizing the published cache state
//! - `POST /refresh` forces a full refresh and returns a [`BatchAccepted`]
//! - `POST /images/load` takes an [`ImageLoadRequest`] and returns an [`ImageLoadResponse`]
//! - `POST /catalog` preloads a catalog body (any recognized catalog shape)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheSnapshot;
use crate::catalog::MediaKind;
use crate::connectivity::ConnectivityStatus;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Loaded,
    Loading,
    Failed,
    /// Embedded video; rendered by the consumer, never fetched
    Embedded,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ItemStatus {
    pub url: String,
    pub kind: MediaKind,
    pub state: ItemState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FadingItem {
    pub url: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusResponse {
    pub version: u64,
    pub running: bool,
    pub tracked: usize,
    pub loaded: usize,
    pub loading: usize,
    pub items: Vec<ItemStatus>,
    pub fading_out: Vec<FadingItem>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub connectivity: ConnectivityStatus,
    pub metrics: MetricsSnapshot,
}

impl StatusResponse {
    pub fn build(
        snapshot: &CacheSnapshot,
        running: bool,
        connectivity: ConnectivityStatus,
        metrics: MetricsSnapshot,
    ) -> Self {
        let items = snapshot
            .catalog
            .iter()
            .map(|descriptor| {
                let loaded = snapshot.loaded.get(&descriptor.url);
                let state = if !descriptor.is_image() {
                    ItemState::Embedded
                } else if loaded.is_some() {
                    ItemState::Loaded
                } else if snapshot.is_loading(&descriptor.url) {
                    ItemState::Loading
                } else {
                    ItemState::Failed
                };

                ItemStatus {
                    url: descriptor.url.clone(),
                    kind: descriptor.kind.clone(),
                    state,
                    caption: descriptor.caption.clone(),
                    collection: descriptor.collection.clone(),
                    width: loaded.map(|cached| cached.image.width),
                    height: loaded.map(|cached| cached.image.height),
                    loaded_at: loaded.map(|cached| cached.loaded_at),
                }
            })
            .collect();

        let mut fading_out: Vec<FadingItem> = snapshot
            .fading_out
            .iter()
            .map(|(url, since)| FadingItem {
                url: url.clone(),
                since: *since,
            })
            .collect();
        fading_out.sort_by(|a, b| a.since.cmp(&b.since).then_with(|| a.url.cmp(&b.url)));

        Self {
            version: snapshot.version,
            running,
            tracked: snapshot.catalog.len(),
            loaded: snapshot.loaded.len(),
            loading: snapshot.loading.len(),
            items,
            fading_out,
            last_refreshed: snapshot.last_refreshed,
            last_error: snapshot.last_error.as_ref().map(ToString::to_string),
            connectivity,
            metrics,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageLoadRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageLoadResponse {
    pub url: String,
    /// False when the identity is already loaded or loading
    pub scheduled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchAccepted {
    pub tracked: usize,
    pub fetching: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub running: bool,
    pub version: String,
}
