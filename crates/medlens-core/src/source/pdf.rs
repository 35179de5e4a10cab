//! Embedded image extraction from PDF documents.
//!
//! Pages are visited in page order and, within a page, image XObjects in the
//! order the resources dictionary lists them (Form XObjects are searched
//! recursively). JPEG streams are emitted exactly as stored. Raw or
//! Flate-compressed pixel data has no self-describing encoding, so it is
//! wrapped losslessly as PNG. JPEG 2000 streams are skipped: the image
//! decoder has no JPEG 2000 support.

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::PipelineError;
use crate::types::{ImageOrigin, RawImage};

/// Resources may be inherited through at most this many `/Parent` hops.
const MAX_INHERIT_DEPTH: usize = 32;

/// Upper bound on the decoded pixel buffer of a single image.
const MAX_DECODED_BYTES: usize = 256 * 1024 * 1024;

/// An `/Indexed` lookup table holds at most 256 entries of 4 components.
const MAX_LOOKUP_BYTES: usize = 256 * 4;

/// Open a PDF and extract every embedded raster image.
///
/// A missing or unparseable document is `SourceUnavailable`; individual
/// images that cannot be extracted are logged and skipped.
pub fn extract_pdf_images(path: &Path) -> Result<Vec<RawImage>, PipelineError> {
    let origin = path.display().to_string();
    if !path.is_file() {
        return Err(PipelineError::SourceUnavailable {
            origin,
            message: "File not found".to_string(),
        });
    }

    let doc = Document::load(path).map_err(|e| PipelineError::SourceUnavailable {
        origin: origin.clone(),
        message: format!("Cannot parse PDF: {e}"),
    })?;

    let images = extract_document_images(&doc);
    tracing::debug!("Extracted {} image(s) from {}", images.len(), origin);
    Ok(images)
}

/// Same as [`extract_pdf_images`] for a document already in memory.
pub fn extract_pdf_images_from_bytes(
    bytes: &[u8],
    origin: &str,
) -> Result<Vec<RawImage>, PipelineError> {
    let doc = Document::load_mem(bytes).map_err(|e| PipelineError::SourceUnavailable {
        origin: origin.to_string(),
        message: format!("Cannot parse PDF: {e}"),
    })?;
    Ok(extract_document_images(&doc))
}

/// Walk a loaded document and pull out image bytes in page-then-page-order.
pub fn extract_document_images(doc: &Document) -> Vec<RawImage> {
    let mut images = Vec::new();

    for (page_number, page_id) in doc.get_pages() {
        let xrefs = page_image_xrefs(doc, page_id);
        tracing::trace!("  Page {}: {} image xref(s)", page_number, xrefs.len());

        for xref in xrefs {
            match extract_image(doc, xref) {
                Ok(bytes) => images.push(RawImage::new(
                    ImageOrigin::Pdf {
                        page: page_number,
                        xref: xref.0,
                    },
                    bytes,
                )),
                Err(e) => tracing::warn!("Skipping image on page {}: {}", page_number, e),
            }
        }
    }

    images
}

/// Image XObject ids used by a page, deduplicated, in resource order.
fn page_image_xrefs(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut found = Vec::new();
    let mut visited_forms = HashSet::new();
    if let Some(resources) = page_resources(doc, page_id) {
        collect_images(doc, resources, &mut found, &mut visited_forms);
    }
    found
}

/// The page's `/Resources`, following `/Parent` for inherited resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node_id = page_id;
    for _ in 0..MAX_INHERIT_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(resources) = node.get(b"Resources") {
            return as_dict(doc, resources);
        }
        node_id = node.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    found: &mut Vec<ObjectId>,
    visited_forms: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| as_dict(doc, obj))
    else {
        return;
    };

    for (_name, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            continue;
        };

        match name(&stream.dict, b"Subtype").as_deref() {
            Some("Image") => {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
            Some("Form") => {
                if visited_forms.insert(id) {
                    if let Some(form_resources) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|obj| as_dict(doc, obj))
                    {
                        collect_images(doc, form_resources, found, visited_forms);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Encoded bytes for one image XObject.
fn extract_image(doc: &Document, id: ObjectId) -> Result<Vec<u8>, PipelineError> {
    let origin = format!("xref {}", id.0);
    let stream = match doc.get_object(id) {
        Ok(Object::Stream(stream)) => stream,
        _ => return Err(PipelineError::decode(origin, "not an image stream")),
    };

    let filters = filters(&stream.dict);
    match filters.as_slice() {
        [only] if only == "DCTDecode" => Ok(stream.content.clone()),
        [.., last] if last == "JPXDecode" => Err(PipelineError::decode(
            origin,
            "JPEG 2000 (JPXDecode) images are not supported",
        )),
        _ => {
            let pixels = decode_pixel_data(doc, stream, &filters)
                .map_err(|message| PipelineError::decode(&origin, message))?;
            let mut buf = Vec::new();
            pixels
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| PipelineError::decode(&origin, format!("PNG encode failed: {e}")))?;
            Ok(buf)
        }
    }
}

/// Color model of an uncompressed image.
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette entries expanded to RGB triplets
    Indexed(Vec<[u8; 3]>),
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed(_) => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

fn decode_pixel_data(
    doc: &Document,
    stream: &Stream,
    filters: &[String],
) -> Result<DynamicImage, String> {
    let dict = &stream.dict;
    let width = dimension(doc, dict, b"Width")?;
    let height = dimension(doc, dict, b"Height")?;

    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bpc = if is_mask {
        1
    } else {
        match integer(doc, dict, b"BitsPerComponent").unwrap_or(8) {
            n @ (1 | 2 | 4 | 8 | 16) => n as usize,
            other => return Err(format!("unsupported BitsPerComponent {other}")),
        }
    };
    let color_space = if is_mask {
        ColorSpace::Gray
    } else {
        let cs = dict.get(b"ColorSpace").map_err(|_| "missing /ColorSpace")?;
        color_space(doc, cs)?
    };

    let components = color_space.components();
    let samples_per_row = (width as usize)
        .checked_mul(components)
        .ok_or("image row size overflows")?;
    let row_bytes = samples_per_row
        .checked_mul(bpc)
        .ok_or("image row size overflows")?
        .div_ceil(8);
    let expected = row_bytes
        .checked_mul(height as usize)
        .filter(|n| *n <= MAX_DECODED_BYTES)
        .ok_or_else(|| format!("image too large to decode ({width}x{height})"))?;

    let predictor = predictor(doc, dict).filter(|p| *p >= 10);
    // PNG predictors prefix every row with a filter-type byte.
    let limit = if predictor.is_some() {
        expected + height as usize
    } else {
        expected
    };

    let mut data = unfilter(stream, filters, limit)?;
    if let Some(predictor) = predictor {
        tracing::trace!("  Undoing PNG predictor {predictor}");
        let bpp = (components * bpc).div_ceil(8).max(1);
        data = undo_png_predictor(&data, row_bytes, bpp)?;
    }

    if data.len() < expected {
        return Err(format!(
            "pixel data too short: {} bytes, expected {}",
            data.len(),
            expected
        ));
    }
    data.truncate(expected);

    let samples = match bpc {
        8 => data,
        // High byte of each big-endian sample.
        16 => data.iter().step_by(2).copied().collect(),
        bits => {
            let scale = !matches!(color_space, ColorSpace::Indexed(_));
            unpack_samples(&data, samples_per_row, row_bytes, bits, scale)
        }
    };

    to_image(width, height, &color_space, samples)
}

/// A positive `/Width` or `/Height`.
fn dimension(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<u32, String> {
    let key_name = String::from_utf8_lossy(key);
    let value = integer(doc, dict, key).ok_or_else(|| format!("missing /{key_name}"))?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| format!("invalid /{key_name} {value}"))
}

fn to_image(
    width: u32,
    height: u32,
    color_space: &ColorSpace,
    samples: Vec<u8>,
) -> Result<DynamicImage, String> {
    let image = match color_space {
        ColorSpace::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        ColorSpace::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        ColorSpace::Cmyk => {
            let rgb = samples
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 255 - px[3] as u16;
                    [
                        ((255 - px[0] as u16) * k / 255) as u8,
                        ((255 - px[1] as u16) * k / 255) as u8,
                        ((255 - px[2] as u16) * k / 255) as u8,
                    ]
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Indexed(palette) => {
            let rgb = samples
                .iter()
                .flat_map(|&i| palette.get(i as usize).copied().unwrap_or([0, 0, 0]))
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
    };
    image.ok_or_else(|| "pixel buffer does not match image dimensions".to_string())
}

fn color_space(doc: &Document, obj: &Object) -> Result<ColorSpace, String> {
    let obj = resolve(doc, obj).ok_or("dangling /ColorSpace reference")?;
    match obj {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(format!(
                "unsupported color space /{}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(items) => {
            let family = match items.first() {
                Some(Object::Name(n)) => n.as_slice(),
                _ => return Err("malformed color space array".to_string()),
            };
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|o| resolve(doc, o))
                        .and_then(|o| match o {
                            Object::Stream(s) => integer(doc, &s.dict, b"N"),
                            _ => None,
                        })
                        .unwrap_or(3);
                    match n {
                        1 => Ok(ColorSpace::Gray),
                        3 => Ok(ColorSpace::Rgb),
                        4 => Ok(ColorSpace::Cmyk),
                        other => Err(format!("unsupported ICCBased component count {other}")),
                    }
                }
                b"CalGray" => Ok(ColorSpace::Gray),
                b"CalRGB" => Ok(ColorSpace::Rgb),
                b"Indexed" | b"I" => indexed_palette(doc, items).map(ColorSpace::Indexed),
                other => Err(format!(
                    "unsupported color space /{}",
                    String::from_utf8_lossy(other)
                )),
            }
        }
        _ => Err("malformed /ColorSpace".to_string()),
    }
}

/// `[/Indexed base hival lookup]` expanded to RGB triplets.
fn indexed_palette(doc: &Document, items: &[Object]) -> Result<Vec<[u8; 3]>, String> {
    let [_, base, _hival, lookup] = items else {
        return Err("malformed /Indexed color space".to_string());
    };
    let base = color_space(doc, base)?;

    let table = match resolve(doc, lookup) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(Object::Stream(s)) => {
            let lookup_filters = filters(&s.dict);
            unfilter(s, &lookup_filters, MAX_LOOKUP_BYTES)?
        }
        _ => return Err("malformed /Indexed lookup table".to_string()),
    };

    let palette = match base {
        ColorSpace::Rgb => table.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
        ColorSpace::Gray => table.iter().map(|&g| [g, g, g]).collect(),
        ColorSpace::Cmyk => table
            .chunks_exact(4)
            .map(|c| {
                let k = 255 - c[3] as u16;
                [
                    ((255 - c[0] as u16) * k / 255) as u8,
                    ((255 - c[1] as u16) * k / 255) as u8,
                    ((255 - c[2] as u16) * k / 255) as u8,
                ]
            })
            .collect(),
        ColorSpace::Indexed(_) => return Err("nested /Indexed color space".to_string()),
    };
    Ok(palette)
}

/// Undo the stream's general-purpose compression filters, decoding at most
/// `limit` bytes from each.
fn unfilter(stream: &Stream, filters: &[String], limit: usize) -> Result<Vec<u8>, String> {
    let mut data = stream.content.clone();
    for filter in filters {
        data = match filter.as_str() {
            "FlateDecode" | "Fl" => inflate(&data, limit)?,
            other => return Err(format!("unsupported filter /{other}")),
        };
    }
    Ok(data)
}

fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(data).take(limit as u64);
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        // Truncated streams are common; keep whatever inflated cleanly.
        Err(_) if !out.is_empty() => Ok(out),
        Err(e) => Err(format!("FlateDecode failed: {e}")),
    }
}

/// Reverse PNG row filters (`/Predictor` >= 10).
fn undo_png_predictor(data: &[u8], row_bytes: usize, bpp: usize) -> Result<Vec<u8>, String> {
    let stride = row_bytes + 1;
    let rows = data.len() / stride;
    let mut out = Vec::with_capacity(rows * row_bytes);
    let mut prev = vec![0u8; row_bytes];

    for row in data.chunks_exact(stride) {
        let (filter, src) = (row[0], &row[1..]);
        let mut cur = vec![0u8; row_bytes];
        for i in 0..row_bytes {
            let a = if i >= bpp { cur[i - bpp] } else { 0 };
            let b = prev[i];
            let c = if i >= bpp { prev[i - bpp] } else { 0 };
            cur[i] = match filter {
                0 => src[i],
                1 => src[i].wrapping_add(a),
                2 => src[i].wrapping_add(b),
                3 => src[i].wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => src[i].wrapping_add(paeth(a, b, c)),
                other => return Err(format!("unknown PNG row filter {other}")),
            };
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Unpack 1, 2 or 4-bit samples into one byte each, dropping row padding.
///
/// With `scale` the samples are stretched to 0..=255; palette indices keep
/// their raw value.
fn unpack_samples(
    data: &[u8],
    samples_per_row: usize,
    row_bytes: usize,
    bits: usize,
    scale: bool,
) -> Vec<u8> {
    let max = (1u16 << bits) - 1;
    let rows = data.len() / row_bytes;
    let mut out = Vec::with_capacity(samples_per_row * rows);
    for row in data.chunks_exact(row_bytes) {
        for i in 0..samples_per_row {
            let bit = i * bits;
            let shift = 8 - bits - bit % 8;
            let value = (row[bit / 8] >> shift) as u16 & max;
            out.push(if scale { (value * 255 / max) as u8 } else { value as u8 });
        }
    }
    out
}

// ── lopdf helpers ──────────────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn name(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

fn integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match resolve(doc, dict.get(key).ok()?)? {
        Object::Integer(n) => Some(*n),
        Object::Real(r) => Some(*r as i64),
        _ => None,
    }
}

/// Filter names in decoding order.
fn filters(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|f| match f {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn predictor(doc: &Document, dict: &Dictionary) -> Option<i64> {
    let parms = match resolve(doc, dict.get(b"DecodeParms").ok()?)? {
        Object::Dictionary(d) => d,
        Object::Array(items) => items.iter().find_map(|o| as_dict(doc, o))?,
        _ => return None,
    };
    integer(doc, parms, b"Predictor")
}
