//! Core data types flowing through the medlens pipeline.
//!
//! A reference names where images come from, the resolver turns it into
//! [`RawImage`]s, the normalizer into canonical JPEGs, and the classifier
//! into a [`Label`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where a run pulls its images from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum ImageReference {
    /// A single image file on disk
    File(PathBuf),
    /// A PDF document whose embedded raster images are extracted
    Pdf(PathBuf),
    /// A direct image link or a web page to scrape (`http`/`https`)
    Url(String),
}

impl ImageReference {
    /// Classify user input as a URL, a PDF path, or a plain image path.
    ///
    /// Paths are treated as PDFs when they carry a `.pdf` extension or, for
    /// existing files, start with the `%PDF` magic bytes.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if is_url(trimmed) {
            return ImageReference::Url(trimmed.to_string());
        }

        let path = PathBuf::from(trimmed);
        let has_pdf_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        if has_pdf_ext || has_pdf_magic(&path) {
            ImageReference::Pdf(path)
        } else {
            ImageReference::File(path)
        }
    }

    /// Human-readable location used in logs and reports.
    pub fn describe(&self) -> String {
        match self {
            ImageReference::File(path) | ImageReference::Pdf(path) => path.display().to_string(),
            ImageReference::Url(url) => url.clone(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn has_pdf_magic(path: &Path) -> bool {
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).is_ok() && &magic == b"%PDF"
}

/// Where a single extracted image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageOrigin {
    /// A standalone image file
    File { path: PathBuf },
    /// An image XObject inside a PDF (1-based page, object number)
    Pdf { page: u32, xref: u32 },
    /// An image fetched over HTTP(S)
    Url { url: String },
}

impl fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageOrigin::File { path } => write!(f, "{}", path.display()),
            ImageOrigin::Pdf { page, xref } => write!(f, "page {page} xref {xref}"),
            ImageOrigin::Url { url } => f.write_str(url),
        }
    }
}

/// Encoded image bytes as extracted from a source, format not yet normalized.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub origin: ImageOrigin,
    pub bytes: Vec<u8>,
    /// Bytes are already the canonical RGB JPEG (URL sources normalize on fetch).
    pub canonical: bool,
}

impl RawImage {
    /// Raw bytes straight from a file or document.
    pub fn new(origin: ImageOrigin, bytes: Vec<u8>) -> Self {
        Self {
            origin,
            bytes,
            canonical: false,
        }
    }

    /// Bytes that have already been through the normalizer.
    pub fn canonical(origin: ImageOrigin, bytes: Vec<u8>) -> Self {
        Self {
            origin,
            bytes,
            canonical: true,
        }
    }
}

/// A decoded-and-re-encoded image in the canonical format (RGB JPEG).
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    /// Decode the canonical bytes back into an RGB bitmap.
    pub fn to_rgb(&self) -> Result<image::DynamicImage, image::ImageError> {
        let img = image::load_from_memory_with_format(&self.bytes, image::ImageFormat::Jpeg)?;
        Ok(image::DynamicImage::ImageRgb8(img.to_rgb8()))
    }
}

/// Classification label. The set is closed; adding classes means changing
/// the classifier's prompt set as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Label {
    Medical,
    NonMedical,
}

impl Label {
    /// All labels, in scoring order.
    pub const ALL: [Label; 2] = [Label::Medical, Label::NonMedical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Medical => "medical",
            Label::NonMedical => "non-medical",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "medical" => Ok(Label::Medical),
            "non-medical" | "nonmedical" | "non_medical" => Ok(Label::NonMedical),
            other => Err(format!(
                "unknown label '{other}' (expected 'medical' or 'non-medical')"
            )),
        }
    }
}

/// Score for one label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: Label,
    /// Cosine similarity between the image and the label's prompt embedding
    pub similarity: f32,
    /// Softmax probability across all labels
    pub probability: f32,
}

/// Result of classifying one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub confidence: f32,
    pub scores: Vec<LabelScore>,
}

/// One classified image in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedImage {
    /// 1-based position in the resolved sequence
    pub index: usize,
    pub origin: ImageOrigin,
    pub width: u32,
    pub height: u32,
    pub label: Label,
    pub confidence: f32,
    /// Wall time spent in the classifier
    pub classify_ms: f64,
}

impl fmt::Display for ClassifiedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Image {}: {} ({:.3}s)",
            self.index,
            self.label,
            self.classify_ms / 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_reference() {
        assert_eq!(
            ImageReference::parse("  https://example.com/page.html "),
            ImageReference::Url("https://example.com/page.html".to_string())
        );
        assert!(matches!(
            ImageReference::parse("HTTP://EXAMPLE.COM/a.jpg"),
            ImageReference::Url(_)
        ));
    }

    #[test]
    fn test_parse_pdf_by_extension() {
        assert_eq!(
            ImageReference::parse("reports/Scan.PDF"),
            ImageReference::Pdf(PathBuf::from("reports/Scan.PDF"))
        );
    }

    #[test]
    fn test_parse_pdf_by_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("document.bin");
        std::fs::write(&path, b"%PDF-1.5\n%...").unwrap();

        let reference = ImageReference::parse(path.to_str().unwrap());
        assert_eq!(reference, ImageReference::Pdf(path));
    }

    #[test]
    fn test_parse_plain_file() {
        assert_eq!(
            ImageReference::parse("photos/xray.png"),
            ImageReference::File(PathBuf::from("photos/xray.png"))
        );
    }

    #[test]
    fn test_label_serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Label::NonMedical).unwrap(),
            "\"non-medical\""
        );
        let parsed: Label = serde_json::from_str("\"medical\"").unwrap();
        assert_eq!(parsed, Label::Medical);
    }

    #[test]
    fn test_label_from_str() {
        assert_eq!("Medical".parse::<Label>().unwrap(), Label::Medical);
        assert_eq!("non-medical".parse::<Label>().unwrap(), Label::NonMedical);
        assert!("radiology".parse::<Label>().is_err());
    }

    #[test]
    fn test_origin_display() {
        let origin = ImageOrigin::Pdf { page: 2, xref: 17 };
        assert_eq!(origin.to_string(), "page 2 xref 17");
    }

    #[test]
    fn test_classified_image_json_shape() {
        let record = ClassifiedImage {
            index: 1,
            origin: ImageOrigin::Url {
                url: "https://example.com/a.png".to_string(),
            },
            width: 64,
            height: 48,
            label: Label::Medical,
            confidence: 0.91,
            classify_ms: 12.5,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"label\":\"medical\""));
        assert!(json.contains("\"type\":\"url\""));
    }
}
