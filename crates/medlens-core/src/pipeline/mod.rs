//! Per-image pipeline stages.
//!
//! - **sniff**: magic-byte format detection
//! - **normalize**: decode any raster format, re-encode as canonical RGB JPEG
//! - **processor**: resolve → normalize → classify orchestration

pub mod normalize;
pub mod processor;
pub mod sniff;

pub use normalize::Normalizer;
pub use processor::{ExtractedImage, ImageProcessor};
pub use sniff::sniff_format;
