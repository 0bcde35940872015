//! Read-only PDF image extraction.
//!
//! Walks pages in order and pulls every Image XObject reachable from the
//! page resources, recursing through Form XObjects. There is no PDF
//! assembler; these records feed preview and review tooling only. The
//! `lopdf` handle is owned by the extractor and released when it drops,
//! error paths included.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Object, ObjectId, Stream};

use crate::error::{Error, ItemError, ItemFailure};
use crate::id::pdf_image_id;
use crate::model::{DocumentFormat, Extraction, ImageRecord, Position, RasterFormat};
use crate::normalize;

pub struct PdfExtractor {
    doc: lopdf::Document,
    path: PathBuf,
}

impl PdfExtractor {
    pub fn open(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if ext.as_deref() != Some("pdf") {
            return Err(Error::FormatMismatch {
                path: path.to_path_buf(),
                detail: "expected a .pdf file".into(),
            });
        }
        let doc = lopdf::Document::load(path).map_err(|e| Error::CorruptContainer {
            detail: format!("{}: {e}", path.display()),
        })?;
        log::info!(
            "PDF loaded: {} ({} pages)",
            path.display(),
            doc.get_pages().len()
        );
        Ok(PdfExtractor {
            doc,
            path: path.to_path_buf(),
        })
    }

    pub fn format_tag(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    pub fn extract_images(&self) -> Result<Extraction, Error> {
        let mut extraction = Extraction::default();
        // get_pages is 1-indexed and ordered.
        for (page_no, page_id) in self.doc.get_pages() {
            let page_idx = (page_no - 1) as usize;
            let image_ids = collect_page_images(&self.doc, page_id);
            for (img_idx, obj_id) in image_ids.into_iter().enumerate() {
                match self.extract_one(obj_id, page_idx, img_idx) {
                    Ok(record) => {
                        log::debug!(
                            "extracted {} ({:?}, {}x{}, object {} {})",
                            record.image_id,
                            record.format,
                            record.width_px,
                            record.height_px,
                            obj_id.0,
                            obj_id.1
                        );
                        extraction.images.push(record);
                    }
                    Err(error) => {
                        let context = format!("page {page_idx}, image {img_idx}");
                        log::warn!("skipping image at {context}: {error}");
                        extraction.failures.push(ItemFailure { context, error });
                    }
                }
            }
        }
        log::info!(
            "PDF extraction complete: {} images, {} skipped ({})",
            extraction.images.len(),
            extraction.failures.len(),
            self.path.display()
        );
        Ok(extraction)
    }

    fn extract_one(
        &self,
        obj_id: ObjectId,
        page_idx: usize,
        img_idx: usize,
    ) -> Result<ImageRecord, ItemError> {
        let stream = match self.doc.get_object(obj_id) {
            Ok(Object::Stream(s)) => s,
            _ => {
                return Err(ItemError::UnsupportedEncoding {
                    detail: "image object is not a stream".into(),
                });
            }
        };

        let (raw, declared) = image_bytes_from_stream(&self.doc, stream)?;
        let norm = normalize::normalize(&raw, declared)?;

        let image_id = pdf_image_id(page_idx, img_idx);
        Ok(ImageRecord {
            filename: format!("{image_id}.{}", norm.format.extension()),
            image_id,
            format: norm.format,
            size_bytes: norm.bytes.len() as u64,
            width_px: norm.width,
            height_px: norm.height,
            bytes: norm.bytes,
            page_or_slide: Some(page_idx as u32 + 1),
            position: Position::Pdf {
                page_index: page_idx,
                image_index: img_idx,
                object_id: obj_id,
            },
            // PDFs carry no per-image alt text in the objects we read.
            existing_alt_text: None,
        })
    }
}

fn name_of(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
        _ => None,
    }
}

fn first_filter(stream: &Stream) -> Option<String> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).to_string()),
        Ok(Object::Array(arr)) => arr.first().and_then(name_of),
        _ => None,
    }
}

fn int_entry(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    match dict.get(key) {
        Ok(Object::Integer(n)) => Some(*n),
        _ => None,
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, ItemError> {
    match int_entry(dict, key) {
        Some(n) if n >= 1 && n <= i64::from(u32::MAX) => Ok(n as u32),
        _ => Err(ItemError::UnsupportedEncoding {
            detail: "image stream has no usable dimensions".into(),
        }),
    }
}

/// The color space name, following one level of indirection. Anything
/// other than a plain name (ICCBased arrays, Indexed, Separation) is
/// unsupported; a missing entry defaults to DeviceRGB.
fn resolve_color_space(doc: &lopdf::Document, dict: &Dictionary) -> Result<String, ItemError> {
    let Ok(obj) = dict.get(b"ColorSpace") else {
        return Ok("DeviceRGB".to_string());
    };
    let resolved = match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    };
    resolved
        .and_then(name_of)
        .ok_or_else(|| ItemError::UnsupportedEncoding {
            detail: "color space is not a plain device name".into(),
        })
}

/// Turn an Image XObject into encoded raster bytes plus the declared
/// format the normalizer should see.
///
/// DCTDecode streams are JPEG and pass straight through. Raw or
/// FlateDecode 8-bit DeviceRGB/DeviceGray streams get wrapped into a PNG
/// (with the SMask as its alpha channel when present, so the normalizer's
/// flattening rule applies). Anything else is an unsupported encoding.
fn image_bytes_from_stream(
    doc: &lopdf::Document,
    stream: &Stream,
) -> Result<(Vec<u8>, Option<RasterFormat>), ItemError> {
    let filter = first_filter(stream);
    if filter.as_deref() == Some("DCTDecode") {
        return Ok((stream.content.clone(), Some(RasterFormat::Jpeg)));
    }

    let mut data = match filter.as_deref() {
        None => stream.content.clone(),
        Some("FlateDecode") => {
            stream
                .decompressed_content()
                .map_err(|e| ItemError::UnsupportedEncoding {
                    detail: format!("FlateDecode stream could not be inflated: {e}"),
                })?
        }
        Some(other) => {
            return Err(ItemError::UnsupportedEncoding {
                detail: format!("filter {other} is not supported"),
            });
        }
    };

    let width = dimension(&stream.dict, b"Width")?;
    let height = dimension(&stream.dict, b"Height")?;
    let bits = int_entry(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(ItemError::UnsupportedEncoding {
            detail: format!("{bits} bits per component is not supported"),
        });
    }
    let color_space = resolve_color_space(doc, &stream.dict)?;
    let channels: u64 = match color_space.as_str() {
        "DeviceRGB" => 3,
        "DeviceGray" => 1,
        other => {
            return Err(ItemError::UnsupportedEncoding {
                detail: format!("color space {other} is not supported"),
            });
        }
    };

    // Exactly width * height * channels bytes reach the encoder: short
    // buffers are an error, trailing padding is dropped.
    let expected = u64::from(width) * u64::from(height) * channels;
    if (data.len() as u64) < expected {
        return Err(ItemError::UnsupportedEncoding {
            detail: "pixel data shorter than Width x Height".into(),
        });
    }
    data.truncate(expected as usize);

    let img = if channels == 3 {
        image::RgbImage::from_raw(width, height, data).map(image::DynamicImage::ImageRgb8)
    } else {
        image::GrayImage::from_raw(width, height, data).map(image::DynamicImage::ImageLuma8)
    }
    .ok_or_else(|| ItemError::UnsupportedEncoding {
        detail: "pixel data does not match the declared dimensions".into(),
    })?;

    // A soft mask becomes the alpha channel; the normalizer then flattens
    // it onto white like any other transparent image.
    let img = match smask_alpha(doc, stream, width, height) {
        Some(alpha) => {
            let rgb = img.to_rgb8();
            let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
            for (pixel, a) in rgb.pixels().zip(alpha.iter()) {
                rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], *a]);
            }
            image::RgbaImage::from_raw(width, height, rgba)
                .map(image::DynamicImage::ImageRgba8)
                .unwrap_or(img)
        }
        None => img,
    };

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok((png, Some(RasterFormat::Png)))
}

/// Decode an 8-bit gray SMask into per-pixel alpha, if one is attached
/// and readable. Unreadable masks are ignored rather than failing the
/// image.
fn smask_alpha(doc: &lopdf::Document, stream: &Stream, width: u32, height: u32) -> Option<Vec<u8>> {
    let Ok(Object::Reference(smask_id)) = stream.dict.get(b"SMask") else {
        return None;
    };
    let Ok(Object::Stream(smask)) = doc.get_object(*smask_id) else {
        return None;
    };
    let mut data = match first_filter(smask).as_deref() {
        None => smask.content.clone(),
        Some("FlateDecode") => smask.decompressed_content().ok()?,
        Some(_) => return None,
    };
    let expected = u64::from(width) * u64::from(height);
    if (data.len() as u64) < expected {
        log::debug!("SMask shorter than image, ignoring");
        return None;
    }
    data.truncate(expected as usize);
    Some(data)
}

fn resolve_dict<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Dictionary(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

/// Page resources, following the Parent chain when a page inherits them.
fn page_resources<'a>(doc: &'a lopdf::Document, page_dict: &'a Dictionary) -> Option<&'a Dictionary> {
    if let Ok(res) = page_dict.get(b"Resources") {
        return resolve_dict(doc, res);
    }
    if let Ok(Object::Reference(parent_id)) = page_dict.get(b"Parent")
        && let Ok(Object::Dictionary(parent)) = doc.get_object(*parent_id)
    {
        return page_resources(doc, parent);
    }
    None
}

/// All Image XObject ids referenced from a page, in resource order,
/// deduplicated by object id across Form XObject recursion.
fn collect_page_images(doc: &lopdf::Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut images = Vec::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();

    let page_dict = match doc.get_object(page_id) {
        Ok(Object::Dictionary(d)) => d,
        _ => return images,
    };
    let Some(resources) = page_resources(doc, page_dict) else {
        return images;
    };
    collect_from_resources(doc, resources, &mut images, &mut seen);
    images
}

fn collect_from_resources(
    doc: &lopdf::Document,
    resources: &Dictionary,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = resources.get(b"XObject").ok().and_then(|o| resolve_dict(doc, o))
    else {
        return;
    };
    for (_, value) in xobjects.iter() {
        let Object::Reference(obj_id) = value else {
            continue;
        };
        if !seen.insert(*obj_id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(*obj_id) else {
            continue;
        };
        match stream.dict.get(b"Subtype").ok().and_then(name_of).as_deref() {
            Some("Image") => images.push(*obj_id),
            Some("Form") => {
                if let Some(inner) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_dict(doc, o))
                {
                    collect_from_resources(doc, inner, images, seen);
                }
            }
            _ => {}
        }
    }
}
