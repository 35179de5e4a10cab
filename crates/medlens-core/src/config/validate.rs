//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.timeout_secs must be > 0".into(),
            ));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "fetch.user_agent must not be empty".into(),
            ));
        }
        if self.fetch.max_download_mb == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.max_download_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.classify_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.classify_timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=100).contains(&self.normalize.jpeg_quality) {
            return Err(ConfigError::ValidationError(
                "normalize.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if self.classifier.image_size == 0 {
            return Err(ConfigError::ValidationError(
                "classifier.image_size must be > 0".into(),
            ));
        }
        if self.classifier.prompts.medical.is_empty()
            || self.classifier.prompts.non_medical.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "classifier.prompts needs at least one prompt per label".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_fetch_timeout() {
        let mut config = Config::default();
        config.fetch.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fetch.timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_blank_user_agent() {
        let mut config = Config::default();
        config.fetch.user_agent = "   ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("user_agent"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_quality() {
        let mut config = Config::default();
        config.normalize.jpeg_quality = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));

        config.normalize.jpeg_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.classify_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("classify_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_empty_prompt_list() {
        let mut config = Config::default();
        config.classifier.prompts.non_medical.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("prompts"));
    }
}
