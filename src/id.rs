//! The ID scheme shared by extractors and assemblers.
//!
//! IDs are pure functions of an image's position in the element tree, so
//! extraction and assembly performed on the same original document always
//! agree on which element an ID refers to, even across process restarts.

/// DOCX: `img-{paragraph_index}-{sequence_within_paragraph}`.
pub fn docx_image_id(paragraph_index: usize, seq: usize) -> String {
    format!("img-{paragraph_index}-{seq}")
}

pub fn parse_docx_image_id(id: &str) -> Option<(usize, usize)> {
    let rest = id.strip_prefix("img-")?;
    let (para, seq) = rest.split_once('-')?;
    Some((para.parse().ok()?, seq.parse().ok()?))
}

/// PPTX: `slide{slide_index}_shape{shape_index}`.
pub fn pptx_image_id(slide_index: usize, shape_index: usize) -> String {
    format!("slide{slide_index}_shape{shape_index}")
}

pub fn parse_pptx_image_id(id: &str) -> Option<(usize, usize)> {
    let (slide, shape) = id.split_once('_')?;
    let slide = slide.strip_prefix("slide")?;
    let shape = shape.strip_prefix("shape")?;
    Some((slide.parse().ok()?, shape.parse().ok()?))
}

/// PDF: `page{page_index}_img{image_index}`. No assembler consumes these;
/// the parser exists for symmetry and manifest tooling.
pub fn pdf_image_id(page_index: usize, image_index: usize) -> String {
    format!("page{page_index}_img{image_index}")
}

pub fn parse_pdf_image_id(id: &str) -> Option<(usize, usize)> {
    let (page, img) = id.split_once('_')?;
    let page = page.strip_prefix("page")?;
    let img = img.strip_prefix("img")?;
    Some((page.parse().ok()?, img.parse().ok()?))
}
