use serde::{Deserialize, Serialize};
use url::Url;

/// What a descriptor points at; fixed when the catalog is parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    EmbeddedVideo { embed_url: String },
}

/// Normalized catalog entry. Identity (and cache key) is `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Collection the descriptor was listed in, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl MediaDescriptor {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
            caption: None,
            collection: None,
        }
    }

    pub fn embedded_video(embed_url: impl Into<String>) -> Self {
        let embed_url = embed_url.into();
        Self {
            url: embed_url.clone(),
            kind: MediaKind::EmbeddedVideo { embed_url },
            caption: None,
            collection: None,
        }
    }

    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn identity(&self) -> &str {
        &self.url
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, MediaKind::Image)
    }

    /// Parsed identity, if it is an absolute http(s) URL
    pub fn parsed_url(&self) -> Option<Url> {
        parse_http_url(&self.url)
    }
}

pub(crate) fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_url_rejects_non_http() {
        assert!(MediaDescriptor::image("https://x/a.jpg").parsed_url().is_some());
        assert!(MediaDescriptor::image("not a url").parsed_url().is_none());
        assert!(MediaDescriptor::image("").parsed_url().is_none());
        assert!(MediaDescriptor::image("data:image/png;base64,AAAA").parsed_url().is_none());
    }

    #[test]
    fn test_video_identity_is_embed_url() {
        let video = MediaDescriptor::embedded_video("https://www.youtube.com/embed/abc123");
        assert!(!video.is_image());
        assert_eq!(video.identity(), "https://www.youtube.com/embed/abc123");
    }

    #[test]
    fn test_serialize_kind_tag() {
        let video = MediaDescriptor::embedded_video("https://player.vimeo.com/video/42")
            .with_collection("cameras");
        let json = serde_json::to_value(&video).unwrap();

        assert_eq!(json["kind"]["type"], "embedded_video");
        assert_eq!(json["kind"]["embed_url"], "https://player.vimeo.com/video/42");
        assert_eq!(json["collection"], "cameras");
        assert!(json.get("caption").is_none());
    }
}
