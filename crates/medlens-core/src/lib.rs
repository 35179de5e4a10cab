//! medlens core: extract images from files, PDFs and web pages, and classify
//! them as medical or non-medical.
//!
//! ```text
//! ImageReference → resolve → [RawImage] → normalize (RGB JPEG) → classify → RunReport
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use medlens_core::{Config, ImageReference, MedLens};
//!
//! #[tokio::main]
//! async fn main() -> medlens_core::Result<()> {
//!     let medlens = MedLens::new(Config::load()?)?;
//!     let report = medlens
//!         .classify(&ImageReference::parse("https://example.com/article.html"))
//!         .await?;
//!     for image in &report.images {
//!         println!("Image {}: {}", image.index, image.label);
//!     }
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod stats;
pub mod types;

use std::sync::Arc;

use tokio::sync::OnceCell;

pub use classify::{Classifier, ZeroShotClassifier};
pub use config::Config;
pub use error::{ConfigError, MedLensError, PipelineError, PipelineResult, Result};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{ExtractedImage, ImageProcessor, Normalizer};
pub use source::ImageResolver;
pub use stats::{Accuracy, RunReport, TimingStats};
pub use types::{
    Classification, ClassifiedImage, ImageOrigin, ImageReference, Label, NormalizedImage, RawImage,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point: configuration, the pipeline, and a lazily loaded classifier.
pub struct MedLens {
    config: Config,
    processor: ImageProcessor,
    classifier: OnceCell<Arc<dyn Classifier>>,
}

impl MedLens {
    /// Build the pipeline. The model is not touched until the first
    /// classification.
    pub fn new(config: Config) -> Result<Self> {
        let processor = ImageProcessor::new(&config)?;
        Ok(Self {
            config,
            processor,
            classifier: OnceCell::new(),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::default())
    }

    /// Use a ready classifier instead of loading the SigLIP model.
    pub fn with_classifier(config: Config, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let processor = ImageProcessor::new(&config)?;
        Ok(Self {
            config,
            processor,
            classifier: OnceCell::from(classifier),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the classifier has been loaded yet.
    pub fn classifier_loaded(&self) -> bool {
        self.classifier.initialized()
    }

    /// The classifier, loading it on first call.
    pub async fn classifier(&self) -> Result<Arc<dyn Classifier>> {
        let classifier = self
            .classifier
            .get_or_try_init(|| async {
                let classifier_config = self.config.classifier.clone();
                let model_dir = self.config.model_dir();

                let loaded = tokio::task::spawn_blocking(move || {
                    ZeroShotClassifier::load(&classifier_config, &model_dir)
                })
                .await
                .map_err(|e| PipelineError::Model {
                    message: format!("Model load task failed: {e}"),
                })??;

                Ok::<Arc<dyn Classifier>, MedLensError>(Arc::new(loaded))
            })
            .await?;

        Ok(Arc::clone(classifier))
    }

    /// Resolve and normalize the images of a reference without classifying.
    pub async fn extract(&self, reference: &ImageReference) -> Result<Vec<ExtractedImage>> {
        Ok(self.processor.extract(reference).await?)
    }

    /// Resolve, normalize and classify every image of a reference.
    pub async fn classify(&self, reference: &ImageReference) -> Result<RunReport> {
        self.classify_with_progress(reference, |_, _| {}).await
    }

    /// [`MedLens::classify`] with a `(done, total)` progress callback.
    pub async fn classify_with_progress<F>(
        &self,
        reference: &ImageReference,
        on_progress: F,
    ) -> Result<RunReport>
    where
        F: FnMut(usize, usize),
    {
        let classifier = self.classifier().await?;
        Ok(self
            .processor
            .classify_with_progress(reference, classifier, on_progress)
            .await?)
    }
}
