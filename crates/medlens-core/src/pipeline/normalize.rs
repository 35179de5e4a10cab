//! Canonical re-encoding of arbitrary raster images.
//!
//! Every image leaving this module is an RGB JPEG at a fixed quality, so the
//! classifier sees one pixel format regardless of where the bytes came from.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::{LimitsConfig, NormalizeConfig};
use crate::error::PipelineError;
use crate::types::NormalizedImage;

use super::sniff::sniff_format;

/// Stateless decoder/re-encoder. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizeConfig,
    limits: LimitsConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizeConfig::default(), LimitsConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizeConfig, limits: LimitsConfig) -> Self {
        Self { config, limits }
    }

    /// Normalize a raw buffer, or return `None` if it cannot be decoded.
    ///
    /// Failures are logged, never raised.
    pub fn normalize(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        match self.normalize_image(bytes, "buffer") {
            Ok(normalized) => Some(normalized.bytes),
            Err(e) => {
                tracing::debug!("Dropping undecodable image: {e}");
                None
            }
        }
    }

    /// Decode with format auto-detection, convert to RGB, and re-encode as JPEG.
    pub fn normalize_image(
        &self,
        bytes: &[u8],
        origin: &str,
    ) -> Result<NormalizedImage, PipelineError> {
        let image = self.decode(bytes, origin)?;
        let rgb = image.to_rgb8();
        let encoded = self.encode_jpeg(&rgb, origin)?;

        Ok(NormalizedImage {
            bytes: encoded,
            width: rgb.width(),
            height: rgb.height(),
        })
    }

    /// Run [`Normalizer::normalize_image`] on the blocking pool with the decode timeout.
    pub async fn normalize_async(
        &self,
        bytes: Vec<u8>,
        origin: String,
    ) -> Result<NormalizedImage, PipelineError> {
        let normalizer = self.clone();
        let timeout_ms = self.limits.decode_timeout_ms;
        let task_origin = origin.clone();

        let result = timeout(
            Duration::from_millis(timeout_ms),
            tokio::task::spawn_blocking(move || normalizer.normalize_image(&bytes, &task_origin)),
        )
        .await;

        match result {
            Ok(Ok(normalized)) => normalized,
            Ok(Err(e)) => Err(PipelineError::decode(origin, format!("Task join error: {e}"))),
            Err(_) => Err(PipelineError::Timeout {
                origin,
                stage: "normalize".to_string(),
                timeout_ms,
            }),
        }
    }

    /// Best-effort format name from magic bytes, for diagnostics.
    pub fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
        sniff_format(bytes)
    }

    /// Accept bytes that are already canonical, reading only their dimensions.
    pub fn accept_canonical(
        &self,
        bytes: Vec<u8>,
        origin: &str,
    ) -> Result<NormalizedImage, PipelineError> {
        let (width, height) = image::ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Jpeg)
            .into_dimensions()
            .map_err(|e| PipelineError::decode(origin, format!("Not a canonical JPEG: {e}")))?;
        self.check_dimensions(width, height, origin)?;

        Ok(NormalizedImage {
            bytes,
            width,
            height,
        })
    }

    fn decode(&self, bytes: &[u8], origin: &str) -> Result<DynamicImage, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::decode(origin, format!("Cannot detect image format: {e}")))?;

        if reader.format().is_none() {
            let sniffed = sniff_format(bytes).unwrap_or("unknown");
            return Err(PipelineError::decode(
                origin,
                format!("Unsupported image format ({sniffed}, {} bytes)", bytes.len()),
            ));
        }

        let image = reader
            .decode()
            .map_err(|e| PipelineError::decode(origin, e.to_string()))?;

        let (width, height) = image.dimensions();
        self.check_dimensions(width, height, origin)?;
        Ok(image)
    }

    fn check_dimensions(&self, width: u32, height: u32, origin: &str) -> Result<(), PipelineError> {
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                origin: origin.to_string(),
                width,
                height,
                max_dim,
            });
        }
        Ok(())
    }

    fn encode_jpeg(&self, rgb: &RgbImage, origin: &str) -> Result<Vec<u8>, PipelineError> {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.config.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| PipelineError::decode(origin, format!("JPEG encode failed: {e}")))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 5) as u8, 128, (x + y) as u8])
        }))
    }

    #[test]
    fn test_png_with_alpha_becomes_rgb_jpeg() {
        let png = encode(&gradient_rgba(40, 30), ImageFormat::Png);
        let normalized = Normalizer::default().normalize(&png).unwrap();

        assert_eq!(sniff_format(&normalized), Some("jpeg"));
        let decoded = image::load_from_memory(&normalized).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_grayscale_expanded_to_three_channels() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(17, 9, Luma([200])));
        let bmp = encode(&gray, ImageFormat::Bmp);

        let normalized = Normalizer::default().normalize_image(&bmp, "gray.bmp").unwrap();
        assert_eq!((normalized.width, normalized.height), (17, 9));

        let decoded = image::load_from_memory(&normalized.bytes).unwrap();
        assert_eq!(decoded.color().channel_count(), 3);
        assert_eq!(decoded.dimensions(), (17, 9));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let gif = encode(&gradient_rgba(25, 25), ImageFormat::Gif);
        let normalizer = Normalizer::default();

        let first = normalizer.normalize(&gif).unwrap();
        let second = normalizer.normalize(&gif).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_garbage_returns_none() {
        let normalizer = Normalizer::default();
        assert!(normalizer.normalize(b"definitely not an image").is_none());
        assert!(normalizer.normalize(&[]).is_none());
    }

    #[test]
    fn test_truncated_png_is_decode_failure() {
        let png = encode(&gradient_rgba(64, 64), ImageFormat::Png);
        let truncated = &png[..png.len() / 2];

        let err = Normalizer::default()
            .normalize_image(truncated, "half.png")
            .unwrap_err();
        assert!(matches!(err, PipelineError::DecodeFailed { .. }));
        assert!(err.to_string().contains("half.png"));
    }

    #[test]
    fn test_oversized_image_rejected() {
        let limits = LimitsConfig {
            max_image_dimension: 16,
            ..LimitsConfig::default()
        };
        let normalizer = Normalizer::new(NormalizeConfig::default(), limits);
        let png = encode(&gradient_rgba(32, 8), ImageFormat::Png);

        let err = normalizer.normalize_image(&png, "wide.png").unwrap_err();
        assert!(matches!(err, PipelineError::ImageTooLarge { width: 32, .. }));
    }

    #[test]
    fn test_accept_canonical_reads_dimensions() {
        let normalizer = Normalizer::default();
        let jpeg = normalizer
            .normalize(&encode(&gradient_rgba(12, 34), ImageFormat::Png))
            .unwrap();

        let accepted = normalizer.accept_canonical(jpeg.clone(), "a.jpg").unwrap();
        assert_eq!((accepted.width, accepted.height), (12, 34));
        assert_eq!(accepted.bytes, jpeg);

        assert!(normalizer
            .accept_canonical(b"<html></html>".to_vec(), "page")
            .is_err());
    }

    #[tokio::test]
    async fn test_normalize_async_matches_sync() {
        let png = encode(&gradient_rgba(20, 10), ImageFormat::Png);
        let normalizer = Normalizer::default();

        let sync = normalizer.normalize(&png).unwrap();
        let async_result = normalizer
            .normalize_async(png, "async.png".to_string())
            .await
            .unwrap();
        assert_eq!(async_result.bytes, sync);
    }
}
