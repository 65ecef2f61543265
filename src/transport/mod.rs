//! HTTP client shared by catalog, probe and image fetches

mod error;

pub use error::{FetchError, Result};

use bytes::Bytes;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::NetworkConfig;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: format!("camfeed/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for HttpConfig {
    fn from(value: &NetworkConfig) -> Self {
        Self {
            request_timeout: value.timeout.as_duration(),
            user_agent: value.user_agent.clone(),
        }
    }
}

/// Whether a GET may be answered from intermediate caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Cached,
    BypassCache,
}

/// Thin wrapper around a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    /// GET a resource body as raw bytes
    pub async fn get_bytes(&self, url: &Url, mode: FetchMode) -> Result<Bytes> {
        debug!(%url, ?mode, "GET");

        let mut request = self.client.get(url.clone());
        if mode == FetchMode::BypassCache {
            request = request
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(PRAGMA, HeaderValue::from_static("no-cache"));
        }

        let response = ensure_success(request.send().await?)?;
        let bytes = response.bytes().await?;

        debug!(%url, size = bytes.len(), "GET completed");
        Ok(bytes)
    }

    /// GET a JSON document body, bypassing intermediate caches
    pub async fn get_json_body(&self, url: &Url) -> Result<Bytes> {
        debug!(%url, "GET json");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await?;

        Ok(ensure_success(response)?.bytes().await?)
    }

    /// HEAD request returning only the response headers
    pub async fn head(&self, url: &Url) -> Result<HeaderMap> {
        debug!(%url, "HEAD");

        let response = self
            .client
            .head(url.clone())
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .send()
            .await?;

        Ok(ensure_success(response)?.headers().clone())
    }

    /// POST a JSON payload, discarding the response body
    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, url: &Url, payload: &T) -> Result<()> {
        let body = serde_json::to_vec(payload).map_err(|e| FetchError::Transport(e.to_string()))?;

        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
            .send()
            .await?;

        ensure_success(response)?;
        Ok(())
    }
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
        });
    }
    Ok(response)
}
