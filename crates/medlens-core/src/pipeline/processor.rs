//! Pipeline orchestration: resolve → normalize → classify, one image at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tokio::time::timeout;

use crate::classify::Classifier;
use crate::config::{Config, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::source::ImageResolver;
use crate::stats::{RunReport, TimingStats};
use crate::types::{Classification, ClassifiedImage, ImageOrigin, ImageReference, NormalizedImage, RawImage};

use super::normalize::Normalizer;

/// A normalized image together with where it came from.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// 1-based position in the resolved sequence
    pub index: usize,
    pub origin: ImageOrigin,
    pub image: NormalizedImage,
}

/// Drives the per-image stages for a reference.
pub struct ImageProcessor {
    resolver: ImageResolver,
    normalizer: Normalizer,
    limits: LimitsConfig,
}

impl ImageProcessor {
    pub fn new(config: &Config) -> PipelineResult<Self> {
        Ok(Self::with_resolver(ImageResolver::new(config)?, config))
    }

    /// Use a pre-built resolver (custom fetcher).
    pub fn with_resolver(resolver: ImageResolver, config: &Config) -> Self {
        Self {
            resolver,
            normalizer: Normalizer::new(config.normalize.clone(), config.limits.clone()),
            limits: config.limits.clone(),
        }
    }

    /// Resolve a reference and normalize every image it yields.
    ///
    /// Images that fail to normalize are logged and left out; their
    /// positions are not reused.
    pub async fn extract(&self, reference: &ImageReference) -> PipelineResult<Vec<ExtractedImage>> {
        let raw = self.resolver.resolve(reference).await?;
        let mut extracted = Vec::with_capacity(raw.len());

        for (i, raw) in raw.into_iter().enumerate() {
            let origin = raw.origin.clone();
            match self.normalize(raw).await {
                Ok(image) => extracted.push(ExtractedImage {
                    index: i + 1,
                    origin,
                    image,
                }),
                Err(e) => tracing::warn!("Image {} dropped: {e}", i + 1),
            }
        }

        Ok(extracted)
    }

    /// Resolve and classify every image of a reference.
    pub async fn classify(
        &self,
        reference: &ImageReference,
        classifier: Arc<dyn Classifier>,
    ) -> PipelineResult<RunReport> {
        self.classify_with_progress(reference, classifier, |_, _| {})
            .await
    }

    /// Like [`ImageProcessor::classify`], calling `on_progress(done, total)`
    /// after each image.
    pub async fn classify_with_progress<F>(
        &self,
        reference: &ImageReference,
        classifier: Arc<dyn Classifier>,
        mut on_progress: F,
    ) -> PipelineResult<RunReport>
    where
        F: FnMut(usize, usize),
    {
        let start = Instant::now();
        let raw = self.resolver.resolve(reference).await?;
        let extraction_seconds = start.elapsed().as_secs_f64();

        let total = raw.len();
        tracing::info!(
            "Extracted {} image(s) from {} in {:.2}s",
            total,
            reference,
            extraction_seconds
        );

        let mut images = Vec::with_capacity(total);
        let mut durations = Vec::with_capacity(total);
        let mut failed = 0;

        for (i, raw) in raw.into_iter().enumerate() {
            let index = i + 1;
            let origin = raw.origin.clone();

            match self.classify_one(raw, Arc::clone(&classifier)).await {
                Ok((image, classification, elapsed)) => {
                    tracing::debug!(
                        "Image {index}: {} ({:.3}) in {:?}",
                        classification.label,
                        classification.confidence,
                        elapsed
                    );
                    durations.push(elapsed);
                    images.push(ClassifiedImage {
                        index,
                        origin,
                        width: image.width,
                        height: image.height,
                        label: classification.label,
                        confidence: classification.confidence,
                        classify_ms: elapsed.as_secs_f64() * 1000.0,
                    });
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!("Image {index} ({origin}) skipped: {e}");
                }
            }
            on_progress(index, total);
        }

        Ok(RunReport {
            reference: reference.describe(),
            extracted: total,
            failed,
            extraction_seconds,
            images,
            classification: TimingStats::from_durations(&durations),
        })
    }

    async fn normalize(&self, raw: RawImage) -> PipelineResult<NormalizedImage> {
        let origin = raw.origin.to_string();
        if raw.canonical {
            self.normalizer.accept_canonical(raw.bytes, &origin)
        } else {
            self.normalizer.normalize_async(raw.bytes, origin).await
        }
    }

    async fn classify_one(
        &self,
        raw: RawImage,
        classifier: Arc<dyn Classifier>,
    ) -> PipelineResult<(NormalizedImage, Classification, Duration)> {
        let origin = raw.origin.to_string();
        let normalized = self.normalize(raw).await?;
        let bitmap = normalized
            .to_rgb()
            .map_err(|e| PipelineError::decode(&origin, e.to_string()))?;

        let (classification, elapsed) = self.run_classifier(bitmap, classifier, origin).await?;
        Ok((normalized, classification, elapsed))
    }

    /// Classify on the blocking pool, bounded by the classify timeout.
    async fn run_classifier(
        &self,
        bitmap: DynamicImage,
        classifier: Arc<dyn Classifier>,
        origin: String,
    ) -> PipelineResult<(Classification, Duration)> {
        let timeout_ms = self.limits.classify_timeout_ms;

        let result = timeout(
            Duration::from_millis(timeout_ms),
            tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                classifier
                    .classify(&bitmap)
                    .map(|classification| (classification, start.elapsed()))
            }),
        )
        .await;

        match result {
            Ok(Ok(classified)) => classified,
            Ok(Err(e)) => Err(PipelineError::Classification {
                origin,
                message: format!("Task join error: {e}"),
            }),
            Err(_) => Err(PipelineError::Timeout {
                origin,
                stage: "classify".to_string(),
                timeout_ms,
            }),
        }
    }
}
