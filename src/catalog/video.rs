//! Locator classification: iframe markup, video platforms, plain images

use regex::Regex;
use std::sync::LazyLock;

use super::descriptor::{MediaDescriptor, parse_http_url};

static IFRAME_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<iframe\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("valid iframe regex")
});

static YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:www\.|m\.)?(?:youtube\.com|youtube-nocookie\.com)/(?:embed/|live/|shorts/|watch\?(?:[^#]*&)?v=)([A-Za-z0-9_-]{6,})",
    )
    .expect("valid youtube regex")
});

static YOUTU_BE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://youtu\.be/([A-Za-z0-9_-]{6,})").expect("valid youtu.be regex")
});

static VIMEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://(?:www\.|player\.)?vimeo\.com/(?:video/)?(\d+)")
        .expect("valid vimeo regex")
});

/// Reduce a raw catalog locator to a URL string.
///
/// Iframe markup yields its `src`; protocol-relative URLs get `https:`.
pub fn extract_locator(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let locator = match IFRAME_SRC.captures(raw) {
        Some(caps) => caps.get(1)?.as_str().trim(),
        None if raw.starts_with('<') => return None,
        None => raw,
    };

    if locator.starts_with("//") {
        Some(format!("https:{locator}"))
    } else {
        Some(locator.to_string())
    }
}

/// Canonical embed URL when the locator points at a recognized video platform
pub fn embed_url(locator: &str) -> Option<String> {
    if let Some(caps) = YOUTUBE.captures(locator).or_else(|| YOUTU_BE.captures(locator)) {
        return Some(format!("https://www.youtube.com/embed/{}", &caps[1]));
    }

    VIMEO
        .captures(locator)
        .map(|caps| format!("https://player.vimeo.com/video/{}", &caps[1]))
}

/// Classify a raw locator into a descriptor; `None` when it is unusable
pub fn classify(raw: &str) -> Option<MediaDescriptor> {
    let locator = extract_locator(raw)?;

    if let Some(embed) = embed_url(&locator) {
        return Some(MediaDescriptor::embedded_video(embed));
    }

    parse_http_url(&locator).map(|url| MediaDescriptor::image(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MediaKind;

    #[test]
    fn test_extract_iframe_src() {
        let markup = r#"<iframe width="560" height="315" src="https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1" frameborder="0"></iframe>"#;
        assert_eq!(
            extract_locator(markup).as_deref(),
            Some("https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1")
        );
    }

    #[test]
    fn test_extract_protocol_relative() {
        assert_eq!(
            extract_locator("<iframe src='//player.vimeo.com/video/76979871'></iframe>").as_deref(),
            Some("https://player.vimeo.com/video/76979871")
        );
    }

    #[test]
    fn test_markup_without_src_is_dropped() {
        assert_eq!(extract_locator("<iframe></iframe>"), None);
        assert_eq!(extract_locator("   "), None);
    }

    #[test]
    fn test_youtube_variants_share_embed_url() {
        let expected = Some("https://www.youtube.com/embed/abcDEF_123".to_string());

        assert_eq!(embed_url("https://www.youtube.com/watch?v=abcDEF_123"), expected);
        assert_eq!(embed_url("https://youtube.com/watch?feature=share&v=abcDEF_123"), expected);
        assert_eq!(embed_url("https://youtu.be/abcDEF_123"), expected);
        assert_eq!(embed_url("https://www.youtube.com/live/abcDEF_123?si=x"), expected);
        assert_eq!(embed_url("https://m.youtube.com/shorts/abcDEF_123"), expected);
        assert_eq!(embed_url("https://www.youtube.com/embed/abcDEF_123"), expected);
    }

    #[test]
    fn test_vimeo() {
        assert_eq!(
            embed_url("https://vimeo.com/76979871").as_deref(),
            Some("https://player.vimeo.com/video/76979871")
        );
    }

    #[test]
    fn test_image_urls_are_not_videos() {
        assert_eq!(embed_url("https://cams.example.com/youtube.jpg"), None);

        let descriptor = classify("https://cams.example.com/harbour.jpg").unwrap();
        assert_eq!(descriptor.kind, MediaKind::Image);
        assert_eq!(descriptor.url, "https://cams.example.com/harbour.jpg");
    }

    #[test]
    fn test_classify_drops_unparseable() {
        assert!(classify("not a url").is_none());
        assert!(classify("/relative/path.jpg").is_none());
    }
}
