//! Pixel preprocessing for the SigLIP vision encoder.
//!
//! Square resize to the model input size, RGB, values scaled to [-1, 1],
//! NCHW layout.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

const CHANNELS: usize = 3;
const NORM_MEAN: f32 = 0.5;
const NORM_STD: f32 = 0.5;

/// Build a `[1, 3, size, size]` input tensor from a bitmap.
pub fn preprocess(image: &DynamicImage, image_size: u32) -> Array4<f32> {
    let size = image_size as usize;
    let rgb = image
        .resize_exact(image_size, image_size, FilterType::CatmullRom)
        .to_rgb8();

    Array4::from_shape_fn((1, CHANNELS, size, size), |(_, c, y, x)| {
        let value = rgb.get_pixel(x as u32, y as u32)[c];
        (value as f32 / 255.0 - NORM_MEAN) / NORM_STD
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, RgbaImage};

    #[test]
    fn test_shape_follows_image_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        assert_eq!(preprocess(&img, 224).shape(), &[1, 3, 224, 224]);
        assert_eq!(preprocess(&img, 384).shape(), &[1, 3, 384, 384]);
    }

    #[test]
    fn test_values_scaled_to_unit_range() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])));
        assert!(preprocess(&white, 32).iter().all(|v| (v - 1.0).abs() < 1e-3));

        let black = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));
        assert!(preprocess(&black, 32).iter().all(|v| (v + 1.0).abs() < 1e-3));
    }

    #[test]
    fn test_channels_are_planar() {
        let red = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255])));
        let tensor = preprocess(&red, 4);
        assert!((tensor[[0, 0, 1, 1]] - 1.0).abs() < 1e-3);
        assert!((tensor[[0, 1, 1, 1]] + 1.0).abs() < 1e-3);
        assert!((tensor[[0, 2, 1, 1]] + 1.0).abs() < 1e-3);
    }
}
