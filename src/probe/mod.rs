//! Cheap catalog change detection via HEAD metadata
//!
//! The version token is taken from the first header present among the
//! configured custom version headers, `ETag` and `Last-Modified`. When none
//! is present a timestamp is synthesized, which never compares equal and so
//! always signals a change.

use chrono::Utc;
use reqwest::header::{ETAG, HeaderMap, LAST_MODIFIED};
use serde::Serialize;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::transport::{HttpClient, Result};

/// Which response header produced a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Header(String),
    ETag,
    LastModified,
    Synthesized,
}

/// Opaque catalog version; equality of `value` is the sole change signal.
///
/// `source` is kept for diagnostics and ignored when comparing.
#[derive(Debug, Clone, Serialize)]
pub struct VersionToken {
    pub value: String,
    pub source: TokenSource,
}

impl PartialEq for VersionToken {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for VersionToken {}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl VersionToken {
    /// Derive a token from response headers, in priority order
    pub fn from_headers(headers: &HeaderMap, version_headers: &[String]) -> Self {
        let header_value = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        for name in version_headers {
            if let Some(value) = header_value(name) {
                return Self {
                    value,
                    source: TokenSource::Header(name.clone()),
                };
            }
        }

        if let Some(value) = header_value(ETAG.as_str()) {
            return Self {
                value,
                source: TokenSource::ETag,
            };
        }

        if let Some(value) = header_value(LAST_MODIFIED.as_str()) {
            return Self {
                value,
                source: TokenSource::LastModified,
            };
        }

        Self {
            value: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            source: TokenSource::Synthesized,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.source == TokenSource::Synthesized
    }
}

/// Outcome of comparing a fresh token with the committed one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Token differs, or nothing committed yet; carries the new token
    Changed(VersionToken),
    Unchanged,
}

/// HEAD-based change detector for the catalog base URL
#[derive(Debug)]
pub struct VersionProbe {
    client: HttpClient,
    target: Url,
    version_headers: Vec<String>,
    committed: Mutex<Option<VersionToken>>,
}

impl VersionProbe {
    pub fn new(client: HttpClient, target: Url, version_headers: Vec<String>) -> Self {
        Self {
            client,
            target,
            version_headers,
            committed: Mutex::new(None),
        }
    }

    /// Issue the HEAD request and derive a token
    pub async fn probe(&self) -> Result<VersionToken> {
        let headers = self.client.head(&self.target).await?;
        let token = VersionToken::from_headers(&headers, &self.version_headers);
        debug!(url = %self.target, token = %token, source = ?token.source, "Version probed");
        Ok(token)
    }

    /// Probe and compare against the committed token.
    ///
    /// Probe failures are returned to the caller, which treats them as
    /// "no change" for the cycle.
    pub async fn check(&self) -> Result<ProbeOutcome> {
        let token = self.probe().await.inspect_err(|e| {
            warn!(url = %self.target, error = %e, "Version probe failed");
        })?;

        let committed = self.committed.lock().await;
        match committed.as_ref() {
            Some(previous) if *previous == token => Ok(ProbeOutcome::Unchanged),
            previous => {
                if let Some(previous) = previous {
                    info!(previous = %previous, current = %token, "Catalog version changed");
                }
                Ok(ProbeOutcome::Changed(token))
            }
        }
    }

    /// Record the token once the catalog sync it triggered has succeeded
    pub async fn commit(&self, token: VersionToken) {
        *self.committed.lock().await = Some(token);
    }

    pub async fn committed(&self) -> Option<VersionToken> {
        self.committed.lock().await.clone()
    }
}
