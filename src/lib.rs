mod docx;
mod error;
pub mod id;
mod model;
mod normalize;
mod ooxml;
mod pdf;
mod pptx;

pub use docx::{DocxAssembler, DocxExtractor};
pub use error::{Error, ItemError, ItemFailure};
pub use model::{
    AltTextAssignment, AnchorKind, ApplyStatus, DocumentFormat, Extraction, ImageRecord, Position,
    RasterFormat,
};
pub use pdf::PdfExtractor;
pub use pptx::{PptxAssembler, PptxExtractor};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// A document we can pull images (and any existing alt text) out of.
pub trait ImageExtractor {
    fn format_tag(&self) -> DocumentFormat;
    fn extract_images(&self) -> Result<Extraction, Error>;
}

/// A document we can write alt text back into. PDFs have no assembler.
pub trait AltTextAssembler {
    fn format_tag(&self) -> DocumentFormat;
    fn apply(
        &mut self,
        assignments: &[AltTextAssignment],
    ) -> Result<BTreeMap<String, ApplyStatus>, Error>;
    fn save(&self, output: &Path) -> Result<(), Error>;
}

impl ImageExtractor for DocxExtractor {
    fn format_tag(&self) -> DocumentFormat {
        self.format_tag()
    }
    fn extract_images(&self) -> Result<Extraction, Error> {
        self.extract_images()
    }
}

impl ImageExtractor for PptxExtractor {
    fn format_tag(&self) -> DocumentFormat {
        self.format_tag()
    }
    fn extract_images(&self) -> Result<Extraction, Error> {
        self.extract_images()
    }
}

impl ImageExtractor for PdfExtractor {
    fn format_tag(&self) -> DocumentFormat {
        self.format_tag()
    }
    fn extract_images(&self) -> Result<Extraction, Error> {
        self.extract_images()
    }
}

impl AltTextAssembler for DocxAssembler {
    fn format_tag(&self) -> DocumentFormat {
        self.format_tag()
    }
    fn apply(
        &mut self,
        assignments: &[AltTextAssignment],
    ) -> Result<BTreeMap<String, ApplyStatus>, Error> {
        self.apply(assignments)
    }
    fn save(&self, output: &Path) -> Result<(), Error> {
        self.save(output)
    }
}

impl AltTextAssembler for PptxAssembler {
    fn format_tag(&self) -> DocumentFormat {
        self.format_tag()
    }
    fn apply(
        &mut self,
        assignments: &[AltTextAssignment],
    ) -> Result<BTreeMap<String, ApplyStatus>, Error> {
        self.apply(assignments)
    }
    fn save(&self, output: &Path) -> Result<(), Error> {
        self.save(output)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Open the right extractor for `path` based on its extension.
pub fn open_extractor(path: &Path) -> Result<Box<dyn ImageExtractor>, Error> {
    match extension_of(path).as_deref() {
        Some("docx") => Ok(Box::new(DocxExtractor::open(path)?)),
        Some("pptx") => Ok(Box::new(PptxExtractor::open(path)?)),
        Some("pdf") => Ok(Box::new(PdfExtractor::open(path)?)),
        _ => Err(Error::FormatMismatch {
            path: path.to_path_buf(),
            detail: "expected a .docx, .pptx or .pdf file".into(),
        }),
    }
}

/// Open the right assembler for `path`. PDFs are extract-only and report
/// a format mismatch here.
pub fn open_assembler(path: &Path) -> Result<Box<dyn AltTextAssembler>, Error> {
    match extension_of(path).as_deref() {
        Some("docx") => Ok(Box::new(DocxAssembler::open(path)?)),
        Some("pptx") => Ok(Box::new(PptxAssembler::open(path)?)),
        Some("pdf") => Err(Error::FormatMismatch {
            path: path.to_path_buf(),
            detail: "PDF documents are extract-only".into(),
        }),
        _ => Err(Error::FormatMismatch {
            path: path.to_path_buf(),
            detail: "expected a .docx or .pptx file".into(),
        }),
    }
}

/// Extract every image from `input`, whatever its format.
pub fn extract_images(input: &Path) -> Result<Extraction, Error> {
    let t0 = Instant::now();

    let extractor = open_extractor(input)?;
    let extraction = extractor.extract_images()?;

    log::info!(
        "Timing: extract={:.1}ms ({} images, {} skipped, {:?})",
        t0.elapsed().as_secs_f64() * 1000.0,
        extraction.images.len(),
        extraction.failures.len(),
        extractor.format_tag(),
    );

    Ok(extraction)
}

/// Apply `assignments` to `input` and write the result to `output`.
/// Returns the per-image status map; per-item failures do not abort the
/// run or the save.
pub fn apply_alt_text(
    input: &Path,
    assignments: &[AltTextAssignment],
    output: &Path,
) -> Result<BTreeMap<String, ApplyStatus>, Error> {
    let t0 = Instant::now();

    let mut assembler = open_assembler(input)?;
    let statuses = assembler.apply(assignments)?;
    let t_apply = t0.elapsed();

    assembler.save(output)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: apply={:.1}ms, save={:.1}ms ({} of {} applied)",
        t_apply.as_secs_f64() * 1000.0,
        (t_total - t_apply).as_secs_f64() * 1000.0,
        statuses.values().filter(|s| s.is_success()).count(),
        statuses.len(),
    );

    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unknown_extension_is_a_format_mismatch() {
        let err = open_extractor(&PathBuf::from("report.txt")).err().unwrap();
        assert!(matches!(err, Error::FormatMismatch { .. }));
    }

    #[test]
    fn pdf_has_no_assembler() {
        let err = open_assembler(&PathBuf::from("report.pdf")).err().unwrap();
        assert!(matches!(err, Error::FormatMismatch { .. }));
    }
}
