//! Per-identity entry state and the published snapshot derived from it

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::decode::DecodedImage;
use crate::catalog::MediaDescriptor;
use crate::transport::FetchError;

/// A successfully decoded image and when it landed
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub image: Arc<DecodedImage>,
    pub loaded_at: DateTime<Utc>,
}

/// Externally observable cache state.
///
/// Built in one piece under the cache lock, so an identity is never seen in
/// both `loaded` and `loading`, and fading identities are never `loading`.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    /// Bumped on every publish
    pub version: u64,
    /// Currently tracked descriptors, in catalog order
    pub catalog: Arc<[MediaDescriptor]>,
    pub loaded: HashMap<String, CachedImage>,
    pub loading: HashSet<String>,
    pub fading_out: HashMap<String, DateTime<Utc>>,
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Most recent catalog-level failure (catalog fetch or version probe)
    pub last_error: Option<FetchError>,
}

impl CacheSnapshot {
    pub fn is_loaded(&self, identity: &str) -> bool {
        self.loaded.contains_key(identity)
    }

    pub fn is_loading(&self, identity: &str) -> bool {
        self.loading.contains(identity)
    }

    /// Tracked image that is neither loading nor loaded
    pub fn is_failed(&self, identity: &str) -> bool {
        self.catalog
            .iter()
            .any(|descriptor| descriptor.url == identity && descriptor.is_image())
            && !self.is_loading(identity)
            && !self.is_loaded(identity)
    }
}

#[derive(Debug)]
pub(super) struct Entry {
    pub descriptor: MediaDescriptor,
    pub content: Option<CachedImage>,
    /// Ticket of the single outstanding fetch, if any
    pub in_flight: Option<u64>,
    pub last_failure: Option<FetchError>,
    pub last_access: Option<DateTime<Utc>>,
    pub fading_since: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(descriptor: MediaDescriptor) -> Self {
        Self {
            descriptor,
            content: None,
            in_flight: None,
            last_failure: None,
            last_access: None,
            fading_since: None,
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fading_since.is_some()
    }

    /// Eligible for a new fetch: tracked image with nothing in flight
    pub fn wants_fetch(&self) -> bool {
        self.descriptor.is_image() && !self.is_fading() && self.in_flight.is_none()
    }

    /// Published as `loading`: fetch running and nothing to show yet
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some() && self.content.is_none() && !self.is_fading()
    }
}

#[derive(Debug, Default)]
pub(super) struct CacheState {
    pub catalog: Vec<MediaDescriptor>,
    pub entries: HashMap<String, Entry>,
    /// Tickets of fetches still running for identities already evicted
    pub orphaned: HashMap<String, u64>,
    pub next_ticket: u64,
    pub version: u64,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
}

impl CacheState {
    pub fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Drop entries whose fade-out grace window has elapsed.
    ///
    /// A fetch still running for an evicted identity is remembered in
    /// `orphaned` until it completes or the identity is tracked again.
    pub fn evict_expired(&mut self, now: DateTime<Utc>, grace: TimeDelta) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter_map(|(identity, entry)| {
                let since = entry.fading_since?;
                (now.signed_duration_since(since) >= grace).then(|| identity.clone())
            })
            .collect();

        for identity in &expired {
            if let Some(ticket) = self.entries.remove(identity).and_then(|entry| entry.in_flight) {
                self.orphaned.insert(identity.clone(), ticket);
            }
        }
        expired
    }

    /// Create the entry for a newly tracked identity, taking over any fetch
    /// that is still running for it from before its eviction
    pub fn track(&mut self, descriptor: &MediaDescriptor) -> &mut Entry {
        let orphaned = self.orphaned.remove(&descriptor.url);
        self.entries
            .entry(descriptor.url.clone())
            .or_insert_with(|| {
                let mut entry = Entry::new(descriptor.clone());
                entry.in_flight = orphaned.filter(|_| descriptor.is_image());
                entry
            })
    }

    /// Advance `last_refreshed`, never moving it backwards
    pub fn mark_refreshed(&mut self, now: DateTime<Utc>) {
        self.last_refreshed = Some(match self.last_refreshed {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    pub fn snapshot(&mut self) -> CacheSnapshot {
        self.version += 1;

        let mut loaded = HashMap::new();
        let mut loading = HashSet::new();
        let mut fading_out = HashMap::new();

        for (identity, entry) in &self.entries {
            if let Some(content) = &entry.content {
                loaded.insert(identity.clone(), content.clone());
            } else if entry.is_loading() {
                loading.insert(identity.clone());
            }
            if let Some(since) = entry.fading_since {
                fading_out.insert(identity.clone(), since);
            }
        }

        CacheSnapshot {
            version: self.version,
            catalog: self.catalog.clone().into(),
            loaded,
            loading,
            fading_out,
            last_refreshed: self.last_refreshed,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_refreshed_is_monotonic() {
        let mut state = CacheState::default();
        let later = Utc::now();
        let earlier = later - TimeDelta::seconds(10);

        state.mark_refreshed(later);
        state.mark_refreshed(earlier);
        assert_eq!(state.last_refreshed, Some(later));
    }

    #[test]
    fn test_evict_expired_respects_grace() {
        let mut state = CacheState::default();
        let now = Utc::now();

        let mut fading = Entry::new(MediaDescriptor::image("https://x/old.jpg"));
        fading.fading_since = Some(now - TimeDelta::seconds(5));
        state.entries.insert("https://x/old.jpg".to_string(), fading);

        let mut recent = Entry::new(MediaDescriptor::image("https://x/recent.jpg"));
        recent.fading_since = Some(now - TimeDelta::seconds(1));
        state.entries.insert("https://x/recent.jpg".to_string(), recent);

        let evicted = state.evict_expired(now, TimeDelta::seconds(3));
        assert_eq!(evicted, vec!["https://x/old.jpg".to_string()]);
        assert!(state.entries.contains_key("https://x/recent.jpg"));
    }

    #[test]
    fn test_evicted_fetch_is_adopted_on_return() {
        let mut state = CacheState::default();
        let now = Utc::now();
        let descriptor = MediaDescriptor::image("https://x/a.jpg");

        let mut entry = Entry::new(descriptor.clone());
        entry.in_flight = Some(7);
        entry.fading_since = Some(now - TimeDelta::seconds(5));
        state.entries.insert(descriptor.url.clone(), entry);

        state.evict_expired(now, TimeDelta::seconds(3));
        assert_eq!(state.orphaned.get("https://x/a.jpg"), Some(&7));

        let entry = state.track(&descriptor);
        assert_eq!(entry.in_flight, Some(7));
        assert!(!entry.wants_fetch());
        assert!(state.orphaned.is_empty());
    }

    #[test]
    fn test_fading_entry_is_never_loading() {
        let mut state = CacheState::default();
        let mut entry = Entry::new(MediaDescriptor::image("https://x/a.jpg"));
        entry.in_flight = Some(1);
        entry.fading_since = Some(Utc::now());
        state.entries.insert("https://x/a.jpg".to_string(), entry);

        let snapshot = state.snapshot();
        assert!(snapshot.loading.is_empty());
        assert!(snapshot.fading_out.contains_key("https://x/a.jpg"));
    }
}
