use serde::{Deserialize, Serialize};

use crate::error::ItemFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentFormat {
    Docx,
    Pptx,
    Pdf,
}

impl DocumentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Pptx => "PPTX",
            DocumentFormat::Pdf => "PDF",
        }
    }
}

/// Raster formats handed to downstream consumers. Anything else embedded in
/// a document (EMF, WMF, TIFF, ...) is converted to PNG during
/// normalization or skipped with a decode failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RasterFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
}

impl RasterFormat {
    /// Map a media part's declared content type to a supported format.
    /// Returns `None` for types that must be re-encoded.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" | "image/jpg" => Some(RasterFormat::Jpeg),
            "image/png" => Some(RasterFormat::Png),
            "image/gif" => Some(RasterFormat::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(RasterFormat::Bmp),
            _ => None,
        }
    }

    /// Fall back on the part's file extension when the package declares
    /// no content type for it.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(RasterFormat::Jpeg),
            "png" => Some(RasterFormat::Png),
            "gif" => Some(RasterFormat::Gif),
            "bmp" => Some(RasterFormat::Bmp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Jpeg => "jpeg",
            RasterFormat::Png => "png",
            RasterFormat::Gif => "gif",
            RasterFormat::Bmp => "bmp",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Inline,
    Floating,
}

/// Format-specific position descriptor, reproducible from the document's
/// element tree alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Position {
    Docx {
        paragraph_index: usize,
        anchor: AnchorKind,
    },
    Pptx {
        slide_index: usize,
        shape_index: usize,
        left_emu: Option<i64>,
        top_emu: Option<i64>,
        width_emu: Option<i64>,
        height_emu: Option<i64>,
        slide_title: Option<String>,
    },
    Pdf {
        page_index: usize,
        image_index: usize,
        object_id: (u32, u16),
    },
}

/// One extracted image. Created once per extraction pass, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: String,
    pub filename: String,
    pub format: RasterFormat,
    /// Normalized image bytes. Not serialized; the CLI writes these to
    /// separate files next to the manifest.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub size_bytes: u64,
    pub width_px: u32,
    pub height_px: u32,
    /// 1-indexed page or slide number; `None` for DOCX (no page concept
    /// at the XML level).
    pub page_or_slide: Option<u32>,
    pub position: Position,
    pub existing_alt_text: Option<String>,
}

/// Outcome of one extraction pass. Skipped images are recorded, not
/// silently dropped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub images: Vec<ImageRecord>,
    pub failures: Vec<ItemFailure>,
}

/// Accessibility text to apply to one image, keyed by the ID the extractor
/// produced for the same document. Empty (or whitespace-only) text marks
/// the image as decorative.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AltTextAssignment {
    pub image_id: String,
    pub text: String,
}

impl AltTextAssignment {
    pub fn is_decorative(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Per-assignment outcome reported by an assembler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ApplyStatus {
    Applied,
    AppliedDecorative,
    Failed { reason: String },
}

impl ApplyStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        ApplyStatus::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ApplyStatus::Failed { .. })
    }
}
