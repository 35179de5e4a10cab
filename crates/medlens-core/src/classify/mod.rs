//! Zero-shot medical / non-medical classification.
//!
//! The rest of the crate only sees the [`Classifier`] trait. The shipped
//! implementation, [`ZeroShotClassifier`], embeds the image with the SigLIP
//! vision encoder and compares it against text embeddings of a few prompts
//! per label.
//!
//! Model files live under the configured model directory:
//!
//! ```text
//! {model_dir}/{model}/visual.onnx
//! {model_dir}/text_model.onnx
//! {model_dir}/tokenizer.json
//! ```

pub mod preprocess;
pub mod scorer;
pub mod text;
pub mod vision;

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::config::ClassifierConfig;
use crate::error::PipelineError;
use crate::types::{Classification, Label};

pub use scorer::{LabelPrompts, LOGIT_SCALE};

use self::preprocess::preprocess;
use self::text::TextEncoder;
use self::vision::VisionEncoder;

pub const VISUAL_MODEL_FILENAME: &str = "visual.onnx";

/// Maps a decoded bitmap to a label.
///
/// Implementations are called from the blocking thread pool.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Classification, PipelineError>;
}

/// SigLIP-based zero-shot classifier.
pub struct ZeroShotClassifier {
    vision: VisionEncoder,
    prompts: LabelPrompts,
    image_size: u32,
}

impl ZeroShotClassifier {
    /// Load both encoders and embed the configured prompts.
    ///
    /// The text encoder is only needed here and is dropped on return.
    pub fn load(config: &ClassifierConfig, model_dir: &Path) -> Result<Self, PipelineError> {
        let vision_path = Self::vision_model_path(config, model_dir);
        if !vision_path.exists() {
            return Err(PipelineError::Model {
                message: format!(
                    "Vision encoder not found at {}. Run `medlens models download` first.",
                    vision_path.display()
                ),
            });
        }

        tracing::info!("Loading SigLIP model from {:?}", vision_path);
        let vision = VisionEncoder::load(&vision_path)?;

        let text = TextEncoder::load(model_dir)?;
        let medical = text.encode_batch(&config.prompts.medical)?;
        let non_medical = text.encode_batch(&config.prompts.non_medical)?;
        let prompts = LabelPrompts::from_prompt_embeddings(vec![
            (Label::Medical, medical),
            (Label::NonMedical, non_medical),
        ])?;

        tracing::info!(
            "Classifier ready ({}, {} + {} prompts, dim {})",
            config.model,
            config.prompts.medical.len(),
            config.prompts.non_medical.len(),
            prompts.embedding_dim()
        );

        Ok(Self {
            vision,
            prompts,
            image_size: config.image_size,
        })
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Classify several images with a single encoder run.
    pub fn classify_batch(
        &self,
        images: &[DynamicImage],
    ) -> Result<Vec<Classification>, PipelineError> {
        let tensors: Vec<_> = images
            .iter()
            .map(|img| preprocess(img, self.image_size))
            .collect();
        let embeddings = self.vision.embed_batch(&tensors)?;
        Ok(embeddings.iter().map(|e| self.prompts.score(e)).collect())
    }

    pub fn vision_model_path(config: &ClassifierConfig, model_dir: &Path) -> PathBuf {
        model_dir.join(&config.model).join(VISUAL_MODEL_FILENAME)
    }

    /// Whether every file `load` needs is on disk.
    pub fn model_exists(config: &ClassifierConfig, model_dir: &Path) -> bool {
        Self::vision_model_path(config, model_dir).exists() && TextEncoder::model_exists(model_dir)
    }
}

impl Classifier for ZeroShotClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Classification, PipelineError> {
        let tensor = preprocess(image, self.image_size);
        let embedding = self.vision.embed(&tensor)?;
        Ok(self.prompts.score(&embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths() {
        let config = ClassifierConfig::default();
        let dir = Path::new("/models");
        assert_eq!(
            ZeroShotClassifier::vision_model_path(&config, dir),
            PathBuf::from("/models/siglip-base-patch16/visual.onnx")
        );
    }

    #[test]
    fn test_missing_model_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ZeroShotClassifier::model_exists(
            &ClassifierConfig::default(),
            dir.path()
        ));

        let err = ZeroShotClassifier::load(&ClassifierConfig::default(), dir.path())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Model { .. }));
        assert!(err.to_string().contains("models download"));
    }
}
