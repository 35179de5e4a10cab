//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Desktop browser identification sent with every outbound request.
/// Many image hosts reject requests without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/127.0.0.0 Safari/537.36";

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.medlens/models"),
        }
    }
}

/// Outbound HTTP settings for URL sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds (HTML pages and images alike)
    pub timeout_secs: u64,

    /// User-Agent header value
    pub user_agent: String,

    /// Maximum accepted response body size in megabytes
    pub max_download_mb: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_download_mb: 50,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Normalization (decode + re-encode) timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Per-image classification timeout in milliseconds
    pub classify_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            classify_timeout_ms: 30000,
        }
    }
}

/// Canonical encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// JPEG quality for the canonical encoding (1-100)
    pub jpeg_quality: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { jpeg_quality: 75 }
    }
}

/// Zero-shot classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Vision model variant ("siglip-base-patch16" or "siglip-base-patch16-384")
    pub model: String,

    /// Image input size, 224 for base, 384 for the 384 variant.
    pub image_size: u32,

    /// Text prompts describing each label
    pub prompts: PromptConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "siglip-base-patch16".to_string(),
            image_size: 224,
            prompts: PromptConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Resolve image size from model name.
    pub fn image_size_for_model(model: &str) -> u32 {
        if model.contains("384") {
            384
        } else {
            224
        }
    }
}

/// Prompt ensembles per label. Embeddings of each list are averaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub medical: Vec<String>,
    pub non_medical: Vec<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            medical: vec![
                "a medical image".to_string(),
                "an x-ray, CT scan or MRI scan".to_string(),
                "a photo of a medical procedure or anatomy".to_string(),
                "a microscopy image of tissue or cells".to_string(),
            ],
            non_medical: vec![
                "a non-medical image".to_string(),
                "a photo of everyday objects, people or scenery".to_string(),
                "a chart, logo or illustration".to_string(),
            ],
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format ("text", "json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            pretty: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
