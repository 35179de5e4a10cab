//! Subcommand implementations.

pub mod bench;
pub mod classify;
pub mod config;
pub mod extract;
pub mod models;

use clap::ValueEnum;
use medlens_core::config::ClassifierConfig;
use medlens_core::{Config, ZeroShotClassifier};

/// Vision model variant used by `--quality high`.
pub const HIGH_QUALITY_MODEL: &str = "siglip-base-patch16-384";

/// Quality preset for the SigLIP vision model resolution.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum Quality {
    /// Base 224 model (default)
    #[default]
    Fast,
    /// Base 384 model, roughly 3-4x slower
    High,
}

/// Switch the classifier to the 384 model when requested and installed.
pub fn apply_quality(config: &mut Config, quality: Quality) {
    if quality == Quality::Fast {
        return;
    }

    let high = ClassifierConfig {
        model: HIGH_QUALITY_MODEL.to_string(),
        image_size: ClassifierConfig::image_size_for_model(HIGH_QUALITY_MODEL),
        prompts: config.classifier.prompts.clone(),
    };

    if ZeroShotClassifier::model_exists(&high, &config.model_dir()) {
        config.classifier = high;
    } else {
        tracing::warn!(
            "Base 384 model not found. Falling back to {}. \
             Run `medlens models download --all` to install it.",
            config.classifier.model
        );
    }
}

/// Progress bar for per-image work; the length is set once known.
pub fn create_progress_bar() -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("extracting...");
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.general.model_dir = dir.to_path_buf();
        config
    }

    #[test]
    fn test_high_quality_falls_back_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());

        apply_quality(&mut config, Quality::High);
        assert_eq!(config.classifier.model, "siglip-base-patch16");
        assert_eq!(config.classifier.image_size, 224);
    }

    #[test]
    fn test_high_quality_switches_when_installed() {
        let dir = tempfile::tempdir().unwrap();
        let variant_dir = dir.path().join(HIGH_QUALITY_MODEL);
        std::fs::create_dir_all(&variant_dir).unwrap();
        std::fs::write(variant_dir.join("visual.onnx"), b"x").unwrap();
        std::fs::write(dir.path().join("text_model.onnx"), b"x").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        let mut config = config_in(dir.path());
        apply_quality(&mut config, Quality::High);
        assert_eq!(config.classifier.model, HIGH_QUALITY_MODEL);
        assert_eq!(config.classifier.image_size, 384);
    }
}
