//! Normalization of the heterogeneous catalog response shapes

use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

use super::descriptor::MediaDescriptor;
use super::video::classify;
use crate::transport::{FetchError, Result};

/// Accepted body shapes, tried in declaration order
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogBody {
    Urls(Vec<String>),
    Objects(Vec<LocatorObject>),
    Cameras { cameras: Vec<LocatorObject> },
    Images { images: Vec<ImageEntry> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageEntry {
    Url(String),
    Object(LocatorObject),
}

#[derive(Debug, Default, Deserialize)]
struct LocatorObject {
    #[serde(default)]
    iframe: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// One extracted locator plus whatever caption travelled with it
struct RawEntry {
    locator: String,
    caption: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|v| !v.trim().is_empty())
}

impl LocatorObject {
    fn caption(&self) -> Option<String> {
        non_blank(&self.caption)
            .or_else(|| non_blank(&self.title))
            .or_else(|| non_blank(&self.name))
            .cloned()
    }

    /// iframe markup, then direct URL, then source field
    fn generic_entry(&self) -> Option<RawEntry> {
        let locator = non_blank(&self.iframe)
            .or_else(|| non_blank(&self.url))
            .or_else(|| non_blank(&self.src))?;
        Some(RawEntry {
            locator: locator.clone(),
            caption: self.caption(),
        })
    }

    /// Camera objects: source field, else iframe markup
    fn camera_entry(&self) -> Option<RawEntry> {
        let locator = non_blank(&self.src).or_else(|| non_blank(&self.iframe))?;
        Some(RawEntry {
            locator: locator.clone(),
            caption: self.caption(),
        })
    }
}

impl CatalogBody {
    fn shape(&self) -> &'static str {
        match self {
            CatalogBody::Urls(_) => "url_list",
            CatalogBody::Objects(_) => "object_list",
            CatalogBody::Cameras { .. } => "cameras",
            CatalogBody::Images { .. } => "images",
        }
    }

    fn into_entries(self) -> Vec<RawEntry> {
        match self {
            CatalogBody::Urls(urls) => urls
                .into_iter()
                .map(|locator| RawEntry {
                    locator,
                    caption: None,
                })
                .collect(),
            CatalogBody::Objects(objects) => objects
                .iter()
                .filter_map(LocatorObject::generic_entry)
                .collect(),
            CatalogBody::Cameras { cameras } => cameras
                .iter()
                .filter_map(LocatorObject::camera_entry)
                .collect(),
            CatalogBody::Images { images } => images
                .into_iter()
                .filter_map(|entry| match entry {
                    ImageEntry::Url(locator) => Some(RawEntry {
                        locator,
                        caption: None,
                    }),
                    ImageEntry::Object(object) => object.generic_entry(),
                })
                .collect(),
        }
    }
}

/// Parse a catalog body into normalized descriptors.
///
/// Unusable locators are dropped and duplicates collapse onto the first
/// occurrence. Fails with `InvalidFormat` when the body matches no known
/// shape or yields no locator strings at all.
pub fn parse_catalog(body: &[u8]) -> Result<Vec<MediaDescriptor>> {
    let parsed: CatalogBody = serde_json::from_slice(body)
        .map_err(|_| FetchError::InvalidFormat("unrecognized catalog shape".to_string()))?;

    let shape = parsed.shape();
    let entries = parsed.into_entries();
    if entries.is_empty() {
        return Err(FetchError::InvalidFormat(format!(
            "no locators found in {shape} catalog"
        )));
    }

    let total = entries.len();
    let mut seen = HashSet::new();
    let descriptors: Vec<MediaDescriptor> = entries
        .into_iter()
        .filter_map(|entry| {
            let descriptor = classify(&entry.locator)?;
            Some(descriptor.with_caption(entry.caption))
        })
        .filter(|descriptor| seen.insert(descriptor.url.clone()))
        .collect();

    debug!(
        shape,
        total,
        kept = descriptors.len(),
        "Catalog normalized"
    );

    Ok(descriptors)
}
