//! Image normalization.
//!
//! Decides whether raw image bytes pass through unchanged or get
//! re-encoded: legacy formats (EMF, WMF, TIFF, ...) become PNG, and images
//! carrying an alpha channel are flattened onto an opaque white background
//! first. Downstream consumers (preview rendering, vision models) assume
//! opaque pixels; a mostly-transparent image that keeps its alpha reads as
//! a blank frame to them.
//!
//! Purely functional: no I/O, no shared state.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::ItemError;
use crate::model::RasterFormat;

pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub format: RasterFormat,
    pub width: u32,
    pub height: u32,
}

/// Normalize one image. `declared` is the format the container claims
/// (`None` when it is not a supported raster format at all).
///
/// Rules, in order:
/// 1. unsupported declared format → decode, flatten, re-encode as PNG;
/// 2. alpha channel present → flatten onto white, re-encode as PNG;
/// 3. otherwise the bytes pass through byte-identical.
///
/// Dimensions are always read from the final bytes' decoded form, never
/// taken from the container's metadata.
pub fn normalize(
    raw: &[u8],
    declared: Option<RasterFormat>,
) -> Result<NormalizedImage, ItemError> {
    let img = image::load_from_memory(raw)?;
    let (width, height) = img.dimensions();

    let needs_reencode = declared.is_none() || img.color().has_alpha();
    match declared {
        Some(format) if !needs_reencode => Ok(NormalizedImage {
            bytes: raw.to_vec(),
            format,
            width,
            height,
        }),
        _ => {
            let flat = flatten_onto_white(img);
            let bytes = encode_png(flat)?;
            Ok(NormalizedImage {
                bytes,
                format: RasterFormat::Png,
                width,
                height,
            })
        }
    }
}

/// Composite onto an opaque white background, yielding RGB8.
fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            let rgba = other.to_rgba8();
            let (w, h) = rgba.dimensions();
            let mut out = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
            for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
                let a = src[3] as u32;
                for c in 0..3 {
                    dst[c] = ((src[c] as u32 * a + 255 * (255 - a)) / 255) as u8;
                }
            }
            out
        }
    }
}

fn encode_png(rgb: RgbImage) -> Result<Vec<u8>, ItemError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}
