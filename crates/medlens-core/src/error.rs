//! Error types for the medlens extraction and classification pipeline.
//!
//! Only [`PipelineError::SourceUnavailable`] is meant to abort a whole run.
//! Every other pipeline error describes a single image and is logged and
//! skipped by the resolver and processor.

use thiserror::Error;

/// Top-level error type for medlens operations.
#[derive(Error, Debug)]
pub enum MedLensError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The referenced file or document is missing or cannot be parsed.
    #[error("Source unavailable: {origin}: {message}")]
    SourceUnavailable { origin: String, message: String },

    /// An HTTP fetch failed, returned a non-success status, or timed out.
    #[error("Fetch failed for {url}: {message}")]
    FetchFailed {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Image bytes could not be decoded or re-encoded.
    #[error("Decode failed for {origin}: {message}")]
    DecodeFailed { origin: String, message: String },

    /// Decoded image dimensions exceed the configured limit
    #[error("Image too large: {origin} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        origin: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {origin} after {timeout_ms}ms")]
    Timeout {
        origin: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Model files missing or failed to load
    #[error("Model error: {message}")]
    Model { message: String },

    /// Inference on a single image failed
    #[error("Classification failed for {origin}: {message}")]
    Classification { origin: String, message: String },
}

impl PipelineError {
    /// Whether this error aborts the whole call rather than a single image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::SourceUnavailable { .. })
    }

    /// Shorthand for a [`PipelineError::DecodeFailed`].
    pub(crate) fn decode(origin: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::DecodeFailed {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// Convenience type alias for medlens results.
pub type Result<T> = std::result::Result<T, MedLensError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_unavailable_is_fatal() {
        let fatal = PipelineError::SourceUnavailable {
            origin: "missing.pdf".to_string(),
            message: "No such file".to_string(),
        };
        assert!(fatal.is_fatal());

        let fetch = PipelineError::FetchFailed {
            url: "https://example.com/a.png".to_string(),
            message: "HTTP 404".to_string(),
            status_code: Some(404),
        };
        assert!(!fetch.is_fatal());
        assert!(!PipelineError::decode("x", "bad header").is_fatal());
    }

    #[test]
    fn test_error_messages_include_context() {
        let err = PipelineError::FetchFailed {
            url: "https://example.com/a.png".to_string(),
            message: "HTTP 503".to_string(),
            status_code: Some(503),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/a.png"));
        assert!(msg.contains("503"));

        let top: MedLensError = PipelineError::decode("page 2", "truncated").into();
        assert!(top.to_string().contains("page 2"));
    }
}
