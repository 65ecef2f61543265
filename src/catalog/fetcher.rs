use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::descriptor::MediaDescriptor;
use super::parse::parse_catalog;
use crate::config::CollectionEndpoint;
use crate::transport::{FetchError, HttpClient, Result};

/// Retrieves and normalizes the media catalog of named collections.
///
/// Stateless across calls; change detection lives in [`crate::probe`].
#[derive(Debug, Clone)]
pub struct CatalogFetcher {
    client: HttpClient,
    collections: Vec<CollectionEndpoint>,
}

impl CatalogFetcher {
    pub fn new(client: HttpClient, collections: Vec<CollectionEndpoint>) -> Self {
        Self {
            client,
            collections,
        }
    }

    pub fn collections(&self) -> &[CollectionEndpoint] {
        &self.collections
    }

    /// Fetch a single collection by name
    pub async fn fetch_catalog(&self, collection: &str) -> Result<Vec<MediaDescriptor>> {
        let endpoint = self
            .collections
            .iter()
            .find(|endpoint| endpoint.name == collection)
            .ok_or_else(|| FetchError::UnknownCollection(collection.to_string()))?;

        self.fetch_endpoint(endpoint).await
    }

    async fn fetch_endpoint(&self, endpoint: &CollectionEndpoint) -> Result<Vec<MediaDescriptor>> {
        let started = Instant::now();
        let body = self.client.get_json_body(&endpoint.url).await.inspect_err(|e| {
            warn!(collection = %endpoint.name, url = %endpoint.url, error = %e, "Catalog fetch failed");
        })?;

        let descriptors: Vec<MediaDescriptor> = parse_catalog(&body)
            .inspect_err(|e| {
                warn!(collection = %endpoint.name, error = %e, "Catalog body rejected");
            })?
            .into_iter()
            .map(|descriptor| descriptor.with_collection(endpoint.name.clone()))
            .collect();

        debug!(
            collection = %endpoint.name,
            count = descriptors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Catalog fetched"
        );

        Ok(descriptors)
    }

    /// Fetch every collection in order and merge them.
    ///
    /// Identities listed by more than one collection keep their first
    /// occurrence. Any collection failure fails the whole merge so a
    /// partial catalog never replaces a complete one.
    pub async fn fetch_all(&self) -> Result<Vec<MediaDescriptor>> {
        let mut merged = Vec::new();
        let mut seen = HashSet::new();

        for endpoint in &self.collections {
            for descriptor in self.fetch_endpoint(endpoint).await? {
                if seen.insert(descriptor.url.clone()) {
                    merged.push(descriptor);
                }
            }
        }

        info!(
            collections = self.collections.len(),
            descriptors = merged.len(),
            "Catalog synchronized"
        );

        Ok(merged)
    }
}
