//! Magic-byte format sniffing for raw image buffers.
//!
//! Used for diagnostics only; actual decoding relies on the `image` crate's
//! own content detection.

/// Identify a raster format from its leading bytes.
///
/// Returns a lowercase format name, or `None` if the header matches nothing
/// known.
pub fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }

    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpeg");
    }

    // PNG: 89 50 4E 47
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("png");
    }

    // GIF: GIF8
    if bytes.starts_with(b"GIF8") {
        return Some("gif");
    }

    // WebP: RIFF....WEBP
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        return Some("webp");
    }

    // BMP: BM
    if bytes.starts_with(b"BM") {
        return Some("bmp");
    }

    // TIFF: II (little-endian) or MM (big-endian) followed by version 42
    if bytes.starts_with(&[b'I', b'I', 0x2A, 0x00]) || bytes.starts_with(&[b'M', b'M', 0x00, 0x2A])
    {
        return Some("tiff");
    }

    // JPEG 2000 codestream or JP2 container
    if bytes.starts_with(&[0xFF, 0x4F, 0xFF, 0x51])
        || (bytes.len() >= 12 && &bytes[4..8] == b"jP  ")
    {
        return Some("jpeg2000");
    }

    // HEIC/HEIF/AVIF: ftyp box at offset 4
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some("heif");
    }

    // Not an image at all, but worth naming when a page hands us HTML
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64)]).to_ascii_lowercase();
    if head.trim_start().starts_with("<!doctype html") || head.trim_start().starts_with("<html") {
        return Some("html");
    }

    None
}
