//! URL heuristics: direct image links, image-like URLs, and reference resolution.

use reqwest::Url;

/// Extensions that mark a URL's last path segment as a direct image link.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Substrings that make a URL worth trying as an image before scraping it.
const IMAGE_URL_PATTERNS: &[&str] = &["/image/", "/photo/", "/img/", ".png", ".jpg", ".jpeg"];

/// How a URL reference should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Last path segment has an image extension: one image or nothing.
    DirectImage,
    /// Looks like it serves an image; try that, then fall back to scraping.
    ImageLike,
    /// Scrape `<img>` elements from the HTML.
    Webpage,
}

/// Decide how to treat a URL.
pub fn classify_url(url: &str) -> UrlKind {
    if is_direct_image_link(url) {
        UrlKind::DirectImage
    } else if looks_like_image(url) {
        UrlKind::ImageLike
    } else {
        UrlKind::Webpage
    }
}

/// True when the trailing path segment ends in a recognized image extension.
///
/// Query strings and fragments are ignored; unparseable input falls back to
/// a plain suffix check on the raw string.
pub fn is_direct_image_link(url: &str) -> bool {
    let last_segment = match Url::parse(url.trim()) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_ascii_lowercase(),
        Err(_) => url.trim().to_ascii_lowercase(),
    };

    last_segment
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext))
}

/// True when the URL contains a typical image-hosting path fragment or
/// extension anywhere in the string.
pub fn looks_like_image(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    IMAGE_URL_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Resolve an `<img src>` value against the page it appeared on.
///
/// `//host/path` takes the page's scheme, `/path` takes the page's scheme and
/// host, anything else is joined relative to the page URL. Returns `None`
/// for empty values and for anything that does not end up `http(s)`.
pub fn resolve_src(page: &Url, src: &str) -> Option<Url> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }

    let resolved = page.join(src).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}
