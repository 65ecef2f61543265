use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::transport::{FetchError, FetchMode, HttpClient, Result};

/// Where image bytes come from
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Bytes>;
}

#[async_trait]
impl ImageSource for HttpClient {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Bytes> {
        let url = Url::parse(url).map_err(|e| FetchError::Transport(format!("invalid URL {url}: {e}")))?;
        self.get_bytes(&url, mode).await
    }
}
