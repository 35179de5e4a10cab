//! Image source resolution: reference → ordered raw image buffers.
//!
//! - **File**: the file's bytes, as-is
//! - **Pdf**: embedded image XObjects in page order ([`pdf`])
//! - **Url**: a direct image link, an image-like URL, or a web page whose
//!   `<img>` elements are fetched one by one ([`url`], [`html`])
//!
//! Only a missing or unparseable local source is an error. Everything that
//! goes wrong with an individual image is logged and the image is left out.

pub mod fetch;
pub mod html;
pub mod pdf;
pub mod url;

use reqwest::Url;
use std::path::Path;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::Normalizer;
use crate::types::{ImageOrigin, ImageReference, RawImage};

pub use fetch::{Fetched, Fetcher, HttpFetcher};
pub use html::collect_image_sources;
pub use pdf::extract_pdf_images;
pub use url::{classify_url, resolve_src, UrlKind};

/// Turns an [`ImageReference`] into the raw images it contains.
pub struct ImageResolver {
    fetcher: Box<dyn Fetcher>,
    normalizer: Normalizer,
}

impl ImageResolver {
    /// Create a resolver using the HTTP fetcher described by `config.fetch`.
    pub fn new(config: &Config) -> PipelineResult<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let normalizer = Normalizer::new(config.normalize.clone(), config.limits.clone());
        Ok(Self::with_fetcher(Box::new(fetcher), normalizer))
    }

    /// Create a resolver with a custom transport.
    pub fn with_fetcher(fetcher: Box<dyn Fetcher>, normalizer: Normalizer) -> Self {
        Self {
            fetcher,
            normalizer,
        }
    }

    /// Resolve a reference into raw image buffers, in source order.
    ///
    /// URL images come back already normalized (`canonical == true`).
    pub async fn resolve(&self, reference: &ImageReference) -> PipelineResult<Vec<RawImage>> {
        tracing::debug!("Resolving {reference}");
        let images = match reference {
            ImageReference::File(path) => self.read_file(path).await?,
            ImageReference::Pdf(path) => self.read_pdf(path).await?,
            ImageReference::Url(url) => self.resolve_url(url).await,
        };
        tracing::debug!("Resolved {} image(s) from {reference}", images.len());
        Ok(images)
    }

    async fn read_file(&self, path: &Path) -> PipelineResult<Vec<RawImage>> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::SourceUnavailable {
                origin: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(vec![RawImage::new(
            ImageOrigin::File {
                path: path.to_path_buf(),
            },
            bytes,
        )])
    }

    async fn read_pdf(&self, path: &Path) -> PipelineResult<Vec<RawImage>> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_pdf_images(&owned))
            .await
            .map_err(|e| PipelineError::SourceUnavailable {
                origin: path.display().to_string(),
                message: format!("PDF extraction task failed: {e}"),
            })?
    }

    async fn resolve_url(&self, url: &str) -> Vec<RawImage> {
        match classify_url(url) {
            UrlKind::DirectImage => match self.fetch_image(url).await {
                Ok(image) => vec![image],
                Err(e) => {
                    tracing::warn!("Skipping image: {e}");
                    Vec::new()
                }
            },
            UrlKind::ImageLike => match self.fetch_image(url).await {
                Ok(image) => vec![image],
                Err(e) => {
                    tracing::debug!("Not an image ({e}), scraping as a web page");
                    self.scrape_page(url).await
                }
            },
            UrlKind::Webpage => self.scrape_page(url).await,
        }
    }

    /// Fetch one image URL and normalize it.
    ///
    /// A body that fails to decode is reported with its declared content
    /// type when the server says it is not an image.
    async fn fetch_image(&self, url: &str) -> PipelineResult<RawImage> {
        let fetched = self.fetcher.fetch(url).await?;
        let content_type = fetched.content_type;
        let normalized = match self
            .normalizer
            .normalize_async(fetched.bytes, url.to_string())
            .await
        {
            Ok(normalized) => normalized,
            Err(e) => {
                return Err(match content_type.filter(|ct| !is_image_content_type(ct)) {
                    Some(ct) => PipelineError::decode(url, format!("response is {ct}, not an image")),
                    None => e,
                })
            }
        };

        Ok(RawImage::canonical(
            ImageOrigin::Url {
                url: url.to_string(),
            },
            normalized.bytes,
        ))
    }

    async fn scrape_page(&self, url: &str) -> Vec<RawImage> {
        let page_url = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid URL {url}: {e}");
                return Vec::new();
            }
        };

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Could not load page: {e}");
                return Vec::new();
            }
        };

        let sources = collect_image_sources(&page.text());
        tracing::debug!("Found {} <img> element(s) on {url}", sources.len());

        let mut images = Vec::with_capacity(sources.len());
        for src in sources {
            let Some(resolved) = resolve_src(&page_url, &src) else {
                tracing::debug!("Skipping unsupported image source: {src}");
                continue;
            };
            match self.fetch_image(resolved.as_str()).await {
                Ok(image) => images.push(image),
                Err(e) => tracing::warn!("Skipping image: {e}"),
            }
        }
        images
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("image/") || essence == "application/octet-stream"
}
